use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the transport layer before a provider can interpret them.
///
/// Provider clients convert these into [`crate::AiError::Provider`] tagged with
/// their own vendor name.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request payload could not be serialized to JSON.
    #[error("failed to serialize request: {0}")]
    Serialize(String),
    /// Connection, TLS, or I/O failure.
    #[error("{0}")]
    Transport(String),
    /// The response body was not valid UTF-8.
    #[error("invalid UTF-8 in response body: {0}")]
    Decode(String),
}

/// JSON POST request shared across providers.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Builds a POST request with a JSON request body.
    ///
    /// # Examples
    ///
    /// ```
    /// use novelflow_ai::http::HttpRequest;
    ///
    /// let request = HttpRequest::post_json("https://example.com", br"{}".to_vec());
    /// assert_eq!(request.headers.get("Content-Type"), Some(&"application/json".to_string()));
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body,
        }
    }

    /// Adds headers on top of the defaults, replacing duplicates.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts the body into a UTF-8 string.
    ///
    /// # Examples
    ///
    /// ```
    /// use novelflow_ai::http::HttpResponse;
    ///
    /// let response = HttpResponse { status: 200, headers: Default::default(), body: b"ok".to_vec() };
    /// assert_eq!(response.into_string().unwrap(), "ok");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Decode`] when the body is not UTF-8.
    pub fn into_string(self) -> Result<String, HttpError> {
        String::from_utf8(self.body).map_err(|err| HttpError::Decode(err.to_string()))
    }
}

/// HTTP response that carries a streaming body.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: HttpBodyStream,
}

impl HttpStreamResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drains the body into a string, used to read error payloads of failed streams.
    pub async fn collect_text(mut self) -> Result<String, HttpError> {
        let mut bytes = Vec::new();
        while let Some(chunk) = self.body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        String::from_utf8(bytes).map_err(|err| HttpError::Decode(err.to_string()))
    }
}

/// Alias for the body stream returned by [`HttpTransport::send_stream`].
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, HttpError>> + Send>>;

/// Transport abstraction used to decouple providers from the concrete HTTP client.
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use novelflow_ai::http::{HttpTransport, HttpRequest, HttpResponse, HttpStreamResponse, HttpError};
/// # use futures_util::stream;
/// struct MemoryTransport;
///
/// #[async_trait]
/// impl HttpTransport for MemoryTransport {
///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
///         Ok(HttpResponse { status: 200, headers: request.headers, body: b"ok".to_vec() })
///     }
///     async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HttpError> {
///         Ok(HttpStreamResponse { status: 200, headers: request.headers, body: Box::pin(stream::empty()) })
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let response = MemoryTransport
///     .send(HttpRequest::post_json("https://example.com", br"{}".to_vec()))
///     .await
///     .unwrap();
/// assert_eq!(response.status, 200);
/// # });
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and resolves when the full response is available.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;

    /// Sends a request and returns a streaming body.
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, HttpError>;
}

/// Thread-safe handle to a transport implementation.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

/// Serializes a body to JSON, attaches headers, and issues a POST request.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if serialization fails or forwards the error raised
/// by [`HttpTransport::send`].
pub async fn post_json_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpResponse, HttpError> {
    let payload = serde_json::to_vec(body).map_err(|err| HttpError::Serialize(err.to_string()))?;
    let request = HttpRequest::post_json(url, payload).with_headers(headers);
    transport.send(request).await
}

/// Streaming counterpart of [`post_json_with_headers`], used for Server-Sent Events.
pub async fn post_json_stream_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpStreamResponse, HttpError> {
    let payload = serde_json::to_vec(body).map_err(|err| HttpError::Serialize(err.to_string()))?;
    let request = HttpRequest::post_json(url, payload).with_headers(headers);
    transport.send_stream(request).await
}

pub mod reqwest;

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde::ser;

    /// Transport that panics if `send` or `send_stream` are invoked.
    struct PanicTransport;

    #[async_trait]
    impl HttpTransport for PanicTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, HttpError> {
            panic!("send should not be called");
        }

        async fn send_stream(&self, _request: HttpRequest) -> Result<HttpStreamResponse, HttpError> {
            panic!("send_stream should not be called");
        }
    }

    /// Body type that intentionally fails serialization.
    struct NonSerializableBody;

    impl Serialize for NonSerializableBody {
        fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            Err(ser::Error::custom(
                "intentional serialization failure for test",
            ))
        }
    }

    #[tokio::test]
    async fn post_json_with_headers_fails_before_sending_on_serde_error() {
        let result = post_json_with_headers(
            &PanicTransport,
            "http://example.com",
            HashMap::new(),
            &NonSerializableBody,
        )
        .await;

        match result {
            Err(HttpError::Serialize(message)) => {
                assert!(message.contains("intentional serialization failure"));
            }
            Ok(_) => panic!("expected serialization error"),
            Err(other) => panic!("unexpected error type: {other:?}"),
        }
    }

    #[test]
    fn with_headers_keeps_content_type() {
        let request = HttpRequest::post_json("https://example.com", Vec::new())
            .with_headers(HashMap::from([("x-api-key".to_string(), "k".to_string())]));
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.headers.get("x-api-key").map(String::as_str), Some("k"));
    }

    #[tokio::test]
    async fn collect_text_joins_chunks() {
        let body: HttpBodyStream = Box::pin(stream::iter(vec![
            Ok(b"{\"error\":".to_vec()),
            Ok(b"1}".to_vec()),
        ]));
        let response = HttpStreamResponse {
            status: 500,
            headers: HashMap::new(),
            body,
        };
        assert!(!response.is_success());
        assert_eq!(response.collect_text().await.unwrap(), "{\"error\":1}");
    }
}
