//! Provider-agnostic request and result shapes.
//!
//! Vendor clients translate these into their own wire formats and map their
//! responses back into [`CompletionResult`]; no vendor field appears here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AiError;

/// Chat role accepted by both vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-tagged text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Output format requested from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Plain text; no parsing is attempted.
    #[default]
    Text,
    /// Output is expected to be JSON and is parsed opportunistically.
    Json,
}

/// Sampling and routing parameters shared by every request shape.
///
/// Unset fields fall back to the provider's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    /// Sampling temperature within `0.0..=2.0`.
    pub temperature: Option<f32>,
    /// Maximum output tokens, strictly positive.
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
}

impl GenerationOptions {
    /// Rejects out-of-range sampling parameters before any network call.
    pub fn validate(&self) -> Result<(), AiError> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AiError::validation(format!(
                    "temperature must be within 0..=2, got {temperature}"
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(AiError::validation("max_tokens must be positive"));
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(AiError::validation("model must not be blank"));
            }
        }
        Ok(())
    }
}

/// Single-turn generation request.
///
/// # Examples
///
/// ```
/// use novelflow_ai::types::{CompletionRequest, ResponseFormat};
///
/// let request = CompletionRequest::new("List three names as a JSON array")
///     .with_system_prompt("You are a naming assistant.")
///     .with_temperature(0.2)
///     .with_response_format(ResponseFormat::Json);
/// assert_eq!(request.options.temperature, Some(0.2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(default)]
    pub options: GenerationOptions,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// Converts the prompt into a single-turn chat, keeping the options.
    pub fn into_chat(self) -> (ChatRequest, ResponseFormat) {
        let chat = ChatRequest {
            messages: vec![ChatMessage::user(self.prompt)],
            options: self.options,
        };
        (chat, self.response_format)
    }
}

/// Multi-turn generation request over an ordered history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), AiError> {
        if self.messages.is_empty() {
            return Err(AiError::validation(
                "chat request requires at least one message",
            ));
        }
        self.options.validate()
    }
}

/// Follow-up action a provider may suggest. No provider populates it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Token accounting reported by the vendor.
///
/// Counts are copied verbatim; a count the vendor omitted stays `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// Metadata attached to every [`CompletionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Model identifier the request was sent with.
    pub model: String,
    /// Registry name the manager routed the call to; the vendor name when a
    /// client is called directly.
    pub provider: String,
    pub usage: TokenUsage,
    /// Vendor stop reason, e.g. `end_turn` or `stop`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Uniform result of `complete` and `chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    /// Parsed JSON, present only for [`ResponseFormat::Json`] requests whose text parsed.
    pub structured_data: Option<Value>,
    pub suggested_actions: Option<Vec<SuggestedAction>>,
    pub metadata: ResultMetadata,
}

impl CompletionResult {
    /// Views the result as either the parsed payload or the raw text.
    pub fn output(&self) -> Output<'_> {
        match &self.structured_data {
            Some(value) => Output::Parsed(value),
            None => Output::Raw(&self.text),
        }
    }
}

/// Borrowed view returned by [`CompletionResult::output`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output<'a> {
    Parsed(&'a Value),
    Raw(&'a str),
}
