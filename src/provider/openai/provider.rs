use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{AiError, ProviderErrorKind};
use crate::http::{
    DynHttpTransport, HttpResponse, HttpStreamResponse, post_json_stream_with_headers,
    post_json_with_headers,
};
use crate::provider::retry::retry_after_from_headers;
use crate::provider::{
    AiProvider, ProviderDefaults, ResolvedOptions, TextStream, map_http_error,
};
use crate::stream::TextDeltaStream;
use crate::types::{ChatRequest, CompletionResult, ResponseFormat};

use super::error::{PROVIDER, parse_openai_error};
use super::request::build_openai_body;
use super::response::map_response;
use super::stream::parse_stream_chunk;
use super::types::OpenAiChatResponse;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI Chat Completions Provider
pub struct OpenAiProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) organization: Option<String>,
    pub(crate) defaults: ProviderDefaults,
}

impl OpenAiProvider {
    pub fn new(
        transport: DynHttpTransport,
        api_key: impl Into<String>,
        defaults: ProviderDefaults,
    ) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            organization: None,
            defaults,
        }
    }

    /// 自定义 base_url，便于接入代理或 OpenAI 兼容层
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 设置 `OpenAI-Organization` 头
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization".to_string(), org.clone());
        }
        headers
    }

    fn prepare(
        &self,
        request: &ChatRequest,
        format: ResponseFormat,
        stream: bool,
    ) -> Result<(ResolvedOptions, Value), AiError> {
        request.validate()?;
        let options = ResolvedOptions::resolve(request, &self.defaults);
        let body = build_openai_body(request, &options, format, stream);
        debug!(
            provider = PROVIDER,
            model = %options.model,
            messages = request.messages.len(),
            json_mode = format == ResponseFormat::Json,
            stream,
            "dispatching openai request"
        );
        Ok((options, body))
    }

    async fn send_request(&self, body: &Value) -> Result<HttpResponse, AiError> {
        post_json_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(),
            body,
        )
        .await
        .map_err(|err| map_http_error(PROVIDER, err))
    }

    async fn send_stream_request(&self, body: &Value) -> Result<HttpStreamResponse, AiError> {
        post_json_stream_with_headers(
            self.transport.as_ref(),
            self.endpoint(),
            self.build_headers(),
            body,
        )
        .await
        .map_err(|err| map_http_error(PROVIDER, err))
    }

    fn ensure_success(&self, response: HttpResponse) -> Result<String, AiError> {
        let status = response.status;
        let retry_after = retry_after_from_headers(&response.headers);
        let text = response
            .into_string()
            .map_err(|err| map_http_error(PROVIDER, err))?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(parse_openai_error(status, &text, retry_after))
        }
    }

    fn try_parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, AiError> {
        serde_json::from_str(text).map_err(|err| {
            AiError::provider(
                PROVIDER,
                ProviderErrorKind::MalformedResponse,
                format!("failed to parse OpenAI response: {err}"),
            )
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn generate(
        &self,
        request: ChatRequest,
        format: ResponseFormat,
    ) -> Result<CompletionResult, AiError> {
        let (options, body) = self.prepare(&request, format, false)?;
        let response = self.send_request(&body).await?;
        let text = self.ensure_success(response)?;
        let parsed: OpenAiChatResponse = self.try_parse(&text)?;
        Ok(map_response(parsed, options.model).into_result(format))
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, AiError> {
        let (_, body) = self.prepare(&request, ResponseFormat::Text, true)?;
        let response = self.send_stream_request(&body).await?;
        if !response.is_success() {
            let status = response.status;
            let retry_after = retry_after_from_headers(&response.headers);
            let text = response
                .collect_text()
                .await
                .map_err(|err| map_http_error(PROVIDER, err))?;
            return Err(parse_openai_error(status, &text, retry_after));
        }
        Ok(Box::pin(TextDeltaStream::new(
            response.body,
            PROVIDER,
            parse_stream_chunk,
        )))
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
