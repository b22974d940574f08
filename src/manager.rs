use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::AiError;
use crate::http::DynHttpTransport;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::{DynProvider, TextStream};
use crate::types::{ChatRequest, CompletionRequest, CompletionResult};

/// AI 调用入口 负责维护已注册的 Provider
///
/// 启动时构建一次并通过 `Arc` 共享，不存在全局实例。
/// 条目保持注册顺序，未指定 provider 的调用由第一个条目处理
pub struct ProviderManager {
    providers: Vec<(String, DynProvider)>,
}

impl ProviderManager {
    pub fn builder() -> ProviderManagerBuilder {
        ProviderManagerBuilder {
            providers: Vec::new(),
        }
    }

    /// 按 `AI_PROVIDER` 注册所有已配置密钥的供应商
    ///
    /// Anthropic 先于 OpenAI 注册，两者都可用时默认使用 Anthropic
    ///
    /// # Errors
    ///
    /// 没有任何供应商可注册时返回 [`AiError::Config`]
    pub fn from_settings(
        settings: &Settings,
        transport: DynHttpTransport,
    ) -> Result<Self, AiError> {
        let mode = settings.ai_provider;
        let mut builder = Self::builder();

        if mode.allows_anthropic() {
            match settings.anthropic_key() {
                Some(key) => {
                    let mut provider = AnthropicProvider::new(
                        transport.clone(),
                        key,
                        settings.anthropic_defaults(),
                    );
                    if let Some(base_url) = &settings.anthropic_base_url {
                        provider = provider.with_base_url(base_url.clone());
                    }
                    builder = builder.register("anthropic", Arc::new(provider));
                }
                None => warn!("anthropic enabled but ANTHROPIC_API_KEY is not set; skipping"),
            }
        }

        if mode.allows_openai() {
            match settings.openai_key() {
                Some(key) => {
                    let mut provider =
                        OpenAiProvider::new(transport.clone(), key, settings.openai_defaults());
                    if let Some(base_url) = &settings.openai_base_url {
                        provider = provider.with_base_url(base_url.clone());
                    }
                    if let Some(organization) = settings.openai_organization() {
                        provider = provider.with_organization(organization);
                    }
                    builder = builder.register("openai", Arc::new(provider));
                }
                None => warn!("openai enabled but OPENAI_API_KEY is not set; skipping"),
            }
        }

        builder.build()
    }

    /// 返回名为 `name` 的 Provider，未指定时返回第一个注册的
    ///
    /// 指定名称查找失败时不会回退到其它 Provider
    pub fn resolve(&self, name: Option<&str>) -> Result<DynProvider, AiError> {
        self.entry(name).map(|(_, provider)| provider.clone())
    }

    fn entry(&self, name: Option<&str>) -> Result<(&str, &DynProvider), AiError> {
        let entry = match name {
            Some(name) => self.providers.iter().find(|(key, _)| key == name),
            None => self.providers.first(),
        };
        match entry {
            Some((key, provider)) => {
                debug!(provider = %key, requested = ?name, "resolved provider");
                Ok((key.as_str(), provider))
            }
            None => Err(AiError::ProviderNotFound {
                name: name.unwrap_or_default().to_string(),
            }),
        }
    }

    /// 按注册顺序返回已注册的名称
    pub fn providers(&self) -> Vec<&str> {
        self.providers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// 未指定 provider 时使用的名称
    pub fn default_provider(&self) -> &str {
        self.providers
            .first()
            .map(|(name, _)| name.as_str())
            .unwrap_or_default()
    }

    /// 通过解析出的 Provider 发送补全请求
    ///
    /// `metadata.provider` 为实际路由到的注册名称
    pub async fn complete(
        &self,
        provider: Option<&str>,
        request: CompletionRequest,
    ) -> Result<CompletionResult, AiError> {
        let (key, client) = self.entry(provider)?;
        let result = client.complete(request).await?;
        Ok(stamp(key, result))
    }

    pub async fn chat(
        &self,
        provider: Option<&str>,
        request: ChatRequest,
    ) -> Result<CompletionResult, AiError> {
        let (key, client) = self.entry(provider)?;
        let result = client.chat(request).await?;
        Ok(stamp(key, result))
    }

    pub async fn stream(
        &self,
        provider: Option<&str>,
        request: CompletionRequest,
    ) -> Result<TextStream, AiError> {
        self.resolve(provider)?.stream(request).await
    }
}

fn stamp(key: &str, mut result: CompletionResult) -> CompletionResult {
    result.metadata.provider = key.to_string();
    result
}

/// 负责注册 Provider 的 Builder
pub struct ProviderManagerBuilder {
    providers: Vec<(String, DynProvider)>,
}

impl ProviderManagerBuilder {
    /// 以 `name` 注册 Provider，重复注册同名时原位替换
    pub fn register<S: Into<String>>(mut self, name: S, provider: DynProvider) -> Self {
        let name = name.into();
        info!(provider = %name, vendor = provider.name(), "registering AI provider");
        match self.providers.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = provider,
            None => self.providers.push((name, provider)),
        }
        self
    }

    /// 构建最终的 ProviderManager
    ///
    /// # Errors
    ///
    /// 未注册任何 Provider 时返回 [`AiError::Config`]
    pub fn build(self) -> Result<ProviderManager, AiError> {
        if self.providers.is_empty() {
            return Err(AiError::config(
                "AI_PROVIDER",
                "no AI provider could be registered; set ANTHROPIC_API_KEY or OPENAI_API_KEY",
            ));
        }
        Ok(ProviderManager {
            providers: self.providers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AiProvider;
    use crate::types::{ResponseFormat, ResultMetadata, TokenUsage};
    use async_trait::async_trait;

    /// 返回自身名称的测试 Provider
    struct NamedProvider {
        name: &'static str,
    }

    #[async_trait]
    impl AiProvider for NamedProvider {
        async fn generate(
            &self,
            _request: ChatRequest,
            _format: ResponseFormat,
        ) -> Result<CompletionResult, AiError> {
            Ok(CompletionResult {
                text: self.name.to_string(),
                structured_data: None,
                suggested_actions: None,
                metadata: ResultMetadata {
                    model: "test-model".to_string(),
                    provider: self.name.to_string(),
                    usage: TokenUsage::default(),
                    stop_reason: None,
                },
            })
        }

        async fn stream_chat(&self, _request: ChatRequest) -> Result<TextStream, AiError> {
            Ok(Box::pin(futures_util::stream::empty()))
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn manager(names: &[&'static str]) -> ProviderManager {
        names
            .iter()
            .copied()
            .fold(ProviderManager::builder(), |builder, name| {
                builder.register(name, Arc::new(NamedProvider { name }))
            })
            .build()
            .expect("non-empty registry")
    }

    #[test]
    fn empty_registry_is_a_config_error() {
        let err = ProviderManager::builder().build().err().expect("error");
        assert!(matches!(err, AiError::Config { .. }));
    }

    #[test]
    fn default_is_first_registered() {
        let manager = manager(&["anthropic", "openai"]);
        assert_eq!(manager.providers(), vec!["anthropic", "openai"]);
        assert_eq!(manager.default_provider(), "anthropic");
        for _ in 0..3 {
            assert_eq!(manager.resolve(None).unwrap().name(), "anthropic");
        }
    }

    #[test]
    fn unknown_name_never_falls_back() {
        let manager = manager(&["openai"]);
        let err = manager.resolve(Some("anthropic")).err().expect("error");
        match err {
            AiError::ProviderNotFound { name } => assert_eq!(name, "anthropic"),
            other => panic!("expected ProviderNotFound, got {other:?}"),
        }
    }

    #[test]
    fn re_registration_replaces_in_place() {
        let manager = ProviderManager::builder()
            .register("a", Arc::new(NamedProvider { name: "first" }))
            .register("b", Arc::new(NamedProvider { name: "second" }))
            .register("a", Arc::new(NamedProvider { name: "third" }))
            .build()
            .unwrap();
        assert_eq!(manager.providers(), vec!["a", "b"]);
        assert_eq!(manager.resolve(None).unwrap().name(), "third");
    }

    #[tokio::test]
    async fn complete_delegates_to_resolved_provider() {
        let manager = manager(&["anthropic", "openai"]);
        let result = manager
            .complete(Some("openai"), CompletionRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(result.text, "openai");
        assert_eq!(result.metadata.provider, "openai");
    }

    #[tokio::test]
    async fn results_carry_the_registry_name() {
        let manager = ProviderManager::builder()
            .register("primary", Arc::new(NamedProvider { name: "anthropic" }))
            .build()
            .unwrap();
        let result = manager
            .chat(Some("primary"), ChatRequest::new(Vec::new()))
            .await
            .unwrap();
        assert_eq!(result.text, "anthropic");
        assert_eq!(result.metadata.provider, "primary");
    }
}
