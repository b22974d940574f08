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

use super::error::{PROVIDER, parse_anthropic_error};
use super::request::build_anthropic_body;
use super::response::map_response;
use super::stream::parse_stream_event;
use super::types::AnthropicMessageResponse;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_VERSION: &str = "2023-06-01";

/// Anthropic Messages Provider（兼容 Claude 3.x Messages API）
///
/// 供应商侧没有 JSON 开关，请求 [`ResponseFormat::Json`] 时由归一化层解析文本
pub struct AnthropicProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) version: String,
    pub(crate) defaults: ProviderDefaults,
}

impl AnthropicProvider {
    /// 使用默认 base_url 与 anthropic-version 创建 Provider
    pub fn new(
        transport: DynHttpTransport,
        api_key: impl Into<String>,
        defaults: ProviderDefaults,
    ) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            version: DEFAULT_VERSION.to_string(),
            defaults,
        }
    }

    /// 自定义 base_url，便于接入代理或兼容层
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 自定义 Anthropic API 版本（anthropic-version）
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/messages")
        } else {
            format!("{base}/v1/messages")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("x-api-key".to_string(), self.api_key.clone()),
            ("anthropic-version".to_string(), self.version.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ])
    }

    fn prepare(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<(ResolvedOptions, Value), AiError> {
        request.validate()?;
        let options = ResolvedOptions::resolve(request, &self.defaults);
        let body = build_anthropic_body(request, &options, stream)?;
        debug!(
            provider = PROVIDER,
            model = %options.model,
            messages = request.messages.len(),
            stream,
            "dispatching anthropic request"
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
            Err(parse_anthropic_error(status, &text, retry_after))
        }
    }

    fn try_parse<T: DeserializeOwned>(&self, text: &str) -> Result<T, AiError> {
        serde_json::from_str(text).map_err(|err| {
            AiError::provider(
                PROVIDER,
                ProviderErrorKind::MalformedResponse,
                format!("failed to parse Anthropic response: {err}"),
            )
        })
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    async fn generate(
        &self,
        request: ChatRequest,
        format: ResponseFormat,
    ) -> Result<CompletionResult, AiError> {
        let (options, body) = self.prepare(&request, false)?;
        let response = self.send_request(&body).await?;
        let text = self.ensure_success(response)?;
        let parsed: AnthropicMessageResponse = self.try_parse(&text)?;
        Ok(map_response(parsed, options.model).into_result(format))
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, AiError> {
        let (_, body) = self.prepare(&request, true)?;
        let response = self.send_stream_request(&body).await?;
        if !response.is_success() {
            let status = response.status;
            let retry_after = retry_after_from_headers(&response.headers);
            let text = response
                .collect_text()
                .await
                .map_err(|err| map_http_error(PROVIDER, err))?;
            return Err(parse_anthropic_error(status, &text, retry_after));
        }
        Ok(Box::pin(TextDeltaStream::new(
            response.body,
            PROVIDER,
            parse_stream_event,
        )))
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::reqwest::ReqwestTransport;

    fn provider(base_url: &str) -> AnthropicProvider {
        let transport: DynHttpTransport = Arc::new(ReqwestTransport::new(reqwest::Client::new()));
        AnthropicProvider::new(
            transport,
            "sk-ant-test",
            ProviderDefaults::new("claude-3-sonnet-20240229", 0.7, 4000),
        )
        .with_base_url(base_url)
    }

    #[test]
    fn endpoint_accepts_base_with_or_without_version_segment() {
        assert_eq!(
            provider("https://api.anthropic.com/").endpoint(),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            provider("https://proxy.local/v1").endpoint(),
            "https://proxy.local/v1/messages"
        );
    }

    #[test]
    fn headers_carry_key_and_version() {
        let headers = provider(DEFAULT_BASE_URL).with_version("2024-01-01").build_headers();
        assert_eq!(headers.get("x-api-key").map(String::as_str), Some("sk-ant-test"));
        assert_eq!(
            headers.get("anthropic-version").map(String::as_str),
            Some("2024-01-01")
        );
    }
}
