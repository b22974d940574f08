use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::{AiError, ProviderErrorKind};
use crate::http::HttpError;
use crate::types::{ChatRequest, CompletionRequest, CompletionResult, ResponseFormat};

pub mod anthropic;
pub mod normalize;
pub mod openai;
mod retry;

/// 流式文本片段别名
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AiError>> + Send>>;

/// 统一的 Provider Trait 所有供应商实现该接口即可接入
///
/// 供应商只需实现 [`AiProvider::generate`] 与 [`AiProvider::stream_chat`]，
/// `complete`、`chat`、`stream` 均基于二者实现
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// 提交完整请求并归一化供应商响应
    ///
    /// `format` 决定供应商侧 JSON 模式（若支持）以及是否尝试解析输出文本
    async fn generate(
        &self,
        request: ChatRequest,
        format: ResponseFormat,
    ) -> Result<CompletionResult, AiError>;

    /// 以流式方式返回文本片段
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, AiError>;

    /// 供应商名称
    fn name(&self) -> &'static str;

    /// 基于 `request.prompt` 的单轮补全
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult, AiError> {
        let (chat, format) = request.into_chat();
        self.generate(chat, format).await
    }

    /// 多轮对话 输出不做 JSON 解析
    async fn chat(&self, request: ChatRequest) -> Result<CompletionResult, AiError> {
        self.generate(request, ResponseFormat::Text).await
    }

    /// 流式单轮补全 不读取 `request.response_format`
    async fn stream(&self, request: CompletionRequest) -> Result<TextStream, AiError> {
        let (chat, _) = request.into_chat();
        self.stream_chat(chat).await
    }
}

/// 线程安全 Provider
pub type DynProvider = Arc<dyn AiProvider>;

/// 请求未指定时使用的默认生成参数
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ProviderDefaults {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// 合并默认值之后的请求参数
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedOptions {
    pub(crate) model: String,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
}

impl ResolvedOptions {
    pub(crate) fn resolve(request: &ChatRequest, defaults: &ProviderDefaults) -> Self {
        let options = &request.options;
        Self {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.clone()),
            temperature: options.temperature.unwrap_or(defaults.temperature),
            max_tokens: options.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

/// 为传输层错误标记发起请求的供应商
pub(crate) fn map_http_error(provider: &'static str, err: HttpError) -> AiError {
    let kind = match err {
        HttpError::Decode(_) => ProviderErrorKind::MalformedResponse,
        HttpError::Serialize(_) | HttpError::Transport(_) => ProviderErrorKind::Transport,
    };
    AiError::provider(provider, kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, GenerationOptions};

    #[test]
    fn explicit_options_win_over_defaults() {
        let defaults = ProviderDefaults::new("claude-3-sonnet-20240229", 0.7, 4000);
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).with_options(
            GenerationOptions {
                temperature: Some(0.0),
                model: Some("claude-3-haiku-20240307".to_string()),
                ..GenerationOptions::default()
            },
        );

        let resolved = ResolvedOptions::resolve(&request, &defaults);
        assert_eq!(resolved.model, "claude-3-haiku-20240307");
        assert_eq!(resolved.temperature, 0.0);
        assert_eq!(resolved.max_tokens, 4000);
    }

    #[test]
    fn http_errors_keep_vendor_and_text() {
        let err = map_http_error("openai", HttpError::Transport("connection refused".into()));
        assert_eq!(
            err.to_string(),
            "openai API error (transport): connection refused"
        );
        let err = map_http_error("anthropic", HttpError::Decode("bad byte".into()));
        assert!(matches!(
            err,
            AiError::Provider {
                kind: ProviderErrorKind::MalformedResponse,
                ..
            }
        ));
    }
}
