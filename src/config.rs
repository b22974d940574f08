use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::AiError;
use crate::provider::ProviderDefaults;

const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Which vendors the manager may register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ProviderMode {
    #[default]
    Anthropic,
    Openai,
    Both,
}

impl ProviderMode {
    pub fn allows_anthropic(self) -> bool {
        matches!(self, Self::Anthropic | Self::Both)
    }

    pub fn allows_openai(self) -> bool {
        matches!(self, Self::Openai | Self::Both)
    }
}

impl FromStr for ProviderMode {
    type Err = AiError;

    /// Parses `anthropic`, `openai` or `both`, ignoring case and surrounding blanks.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::Openai),
            "both" => Ok(Self::Both),
            other => Err(AiError::config(
                "AI_PROVIDER",
                format!("expected anthropic, openai or both, got '{other}'"),
            )),
        }
    }
}

impl TryFrom<String> for ProviderMode {
    type Error = AiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Process-wide settings, read once at startup.
///
/// Keys mirror the environment variable names, lowercased: `AI_PROVIDER`
/// becomes `ai_provider` and so on.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ai_provider: ProviderMode,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Default model of the Anthropic client.
    pub default_model: String,
    pub openai_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub anthropic_base_url: Option<String>,
    pub openai_base_url: Option<String>,
    /// Sent as `OpenAI-Organization` when set.
    pub openai_organization: Option<String>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai_provider: ProviderMode::default(),
            anthropic_api_key: None,
            openai_api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            anthropic_base_url: None,
            openai_base_url: None,
            openai_organization: None,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("Settings")
            .field("ai_provider", &self.ai_provider)
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("default_model", &self.default_model)
            .field("openai_model", &self.openai_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_organization", &self.openai_organization)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Settings {
    /// Loads `.env`, the optional `config/novelflow` file and the process environment.
    ///
    /// Environment variables win over the file, which wins over built-in defaults.
    pub fn load() -> Result<Self, AiError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/novelflow").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()
            .map_err(|err| AiError::config("settings", err.to_string()))?;

        Self::from_config(config)
    }

    /// Deserializes and validates settings from an already assembled source.
    pub fn from_config(config: config::Config) -> Result<Self, AiError> {
        let settings: Self = config
            .try_deserialize()
            .map_err(|err| AiError::config("settings", err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), AiError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(AiError::config(
                "DEFAULT_TEMPERATURE",
                format!("must be within 0..=2, got {}", self.default_temperature),
            ));
        }
        if self.default_max_tokens == 0 {
            return Err(AiError::config("DEFAULT_MAX_TOKENS", "must be positive"));
        }
        Ok(())
    }

    /// Anthropic credential; blank values count as absent.
    pub fn anthropic_key(&self) -> Option<&str> {
        non_blank(self.anthropic_api_key.as_deref())
    }

    /// OpenAI credential; blank values count as absent.
    pub fn openai_key(&self) -> Option<&str> {
        non_blank(self.openai_api_key.as_deref())
    }

    /// OpenAI organization id; blank values count as absent.
    pub fn openai_organization(&self) -> Option<&str> {
        non_blank(self.openai_organization.as_deref())
    }

    pub fn anthropic_defaults(&self) -> ProviderDefaults {
        ProviderDefaults::new(
            self.default_model.clone(),
            self.default_temperature,
            self.default_max_tokens,
        )
    }

    pub fn openai_defaults(&self) -> ProviderDefaults {
        ProviderDefaults::new(
            self.openai_model.clone(),
            self.default_temperature,
            self.default_max_tokens,
        )
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(overrides: &[(&str, &str)]) -> Result<Settings, AiError> {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder
                .set_override(*key, *value)
                .expect("override accepted");
        }
        Settings::from_config(builder.build().expect("config builds"))
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let settings = settings_with(&[]).unwrap();
        assert_eq!(settings.ai_provider, ProviderMode::Anthropic);
        assert_eq!(settings.default_model, "claude-3-sonnet-20240229");
        assert_eq!(settings.openai_model, "gpt-4-turbo-preview");
        assert_eq!(settings.default_temperature, 0.7);
        assert_eq!(settings.default_max_tokens, 4000);
        assert_eq!(settings.logging(), LoggingConfig::default());
        assert!(settings.anthropic_key().is_none());
    }

    #[test]
    fn provider_mode_is_case_insensitive() {
        let settings = settings_with(&[("ai_provider", "BOTH")]).unwrap();
        assert_eq!(settings.ai_provider, ProviderMode::Both);
        assert!(settings.ai_provider.allows_anthropic());
        assert!(settings.ai_provider.allows_openai());

        assert_eq!(" OpenAI ".parse::<ProviderMode>().unwrap(), ProviderMode::Openai);
        assert!("gemini".parse::<ProviderMode>().is_err());
    }

    #[test]
    fn blank_organization_counts_as_absent() {
        let settings = settings_with(&[("openai_organization", "  ")]).unwrap();
        assert!(settings.openai_organization().is_none());

        let settings = settings_with(&[("openai_organization", "org-novel")]).unwrap();
        assert_eq!(settings.openai_organization(), Some("org-novel"));
    }

    #[test]
    fn unknown_provider_mode_is_a_config_error() {
        let err = settings_with(&[("ai_provider", "gemini")]).unwrap_err();
        assert!(matches!(err, AiError::Config { .. }));
    }

    #[test]
    fn blank_credentials_count_as_absent() {
        let settings =
            settings_with(&[("anthropic_api_key", "  "), ("openai_api_key", "sk-live")]).unwrap();
        assert_eq!(settings.anthropic_key(), None);
        assert_eq!(settings.openai_key(), Some("sk-live"));
    }

    #[test]
    fn out_of_range_defaults_are_rejected() {
        let err = settings_with(&[("default_temperature", "3.5")]).unwrap_err();
        assert!(matches!(err, AiError::Config { ref field, .. } if field == "DEFAULT_TEMPERATURE"));
        let err = settings_with(&[("default_max_tokens", "0")]).unwrap_err();
        assert!(matches!(err, AiError::Config { .. }));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let settings = settings_with(&[("openai_api_key", "sk-secret")]).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
