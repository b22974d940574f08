use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the provider layer.
///
/// Only [`AiError::Provider`] originates from a vendor call; the remaining variants
/// are raised locally (configuration, lookup, templates, request validation) and are
/// never retried by this crate.
#[derive(Debug, Error)]
pub enum AiError {
    /// Raised when settings cannot be loaded or no provider could be registered.
    #[error("invalid configuration for {field}: {reason}")]
    Config {
        /// Name of the configuration key that failed.
        field: String,
        /// Additional context explaining the failure.
        reason: String,
    },
    /// The caller asked for a provider that is not in the registry.
    #[error("AI service '{name}' not available")]
    ProviderNotFound { name: String },
    /// Uniform wrapper around any failure during a vendor call.
    #[error("{provider} API error ({kind}): {message}")]
    Provider {
        /// Vendor that raised the error, such as `anthropic`; independent of the registry name.
        provider: &'static str,
        /// Classification parsed from the transport or the vendor error body.
        kind: ProviderErrorKind,
        /// Original error text, kept verbatim for debugging.
        message: String,
    },
    /// Signals invalid request parameters detected before dispatch.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// The referenced prompt template is not registered.
    #[error("template '{template_id}' not found")]
    TemplateNotFound { template_id: String },
    /// A strict template fill found a placeholder without a value.
    #[error("template '{template_id}' is missing variable '{name}'")]
    MissingVariable { template_id: String, name: String },
    /// The referenced authoring role does not exist.
    #[error("AI role '{role}' not found")]
    RoleNotFound { role: String },
}

/// Classification attached to [`AiError::Provider`].
///
/// Callers owning a retry policy can match on this instead of parsing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Network or connection failure before a response was received.
    Transport,
    /// Invalid or missing credentials.
    Auth,
    /// The vendor throttled the request.
    RateLimited {
        /// Wait duration suggested through `Retry-After`, if any.
        retry_after: Option<Duration>,
    },
    /// Prompt or completion exceeds the model's token budget.
    TokenLimitExceeded,
    /// The requested model could not be resolved by the vendor.
    ModelNotFound { model: Option<String> },
    /// The vendor rejected the request payload.
    InvalidRequest,
    /// Any other non-success status.
    Upstream { status: u16 },
    /// The vendor answered with a body we could not decode.
    MalformedResponse,
    /// A streaming body ended before the vendor's completion signal.
    StreamClosed,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::Auth => f.write_str("auth"),
            Self::RateLimited { .. } => f.write_str("rate limited"),
            Self::TokenLimitExceeded => f.write_str("token limit exceeded"),
            Self::ModelNotFound { .. } => f.write_str("model not found"),
            Self::InvalidRequest => f.write_str("invalid request"),
            Self::Upstream { status } => write!(f, "status {status}"),
            Self::MalformedResponse => f.write_str("malformed response"),
            Self::StreamClosed => f.write_str("stream closed"),
        }
    }
}

impl AiError {
    /// Creates an [`AiError::Provider`] for the given vendor.
    ///
    /// # Examples
    ///
    /// ```
    /// use novelflow_ai::error::{AiError, ProviderErrorKind};
    ///
    /// let err = AiError::provider("openai", ProviderErrorKind::Transport, "dns lookup failed");
    /// assert!(matches!(err, AiError::Provider { provider: "openai", .. }));
    /// assert_eq!(err.to_string(), "openai API error (transport): dns lookup failed");
    /// ```
    pub fn provider<T: Into<String>>(
        provider: &'static str,
        kind: ProviderErrorKind,
        message: T,
    ) -> Self {
        Self::Provider {
            provider,
            kind,
            message: message.into(),
        }
    }

    /// Creates an [`AiError::Config`] for the given configuration key.
    pub fn config<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`AiError::Validation`] from a textual description.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns the vendor name for provider failures.
    pub fn provider_name(&self) -> Option<&'static str> {
        match self {
            Self::Provider { provider, .. } => Some(provider),
            _ => None,
        }
    }
}

/// Returns `true` when an error code or message suggests a context/window overflow.
pub(crate) fn looks_like_token_limit_error(code_hint: Option<&str>, message: &str) -> bool {
    if let Some(code) = code_hint {
        let lower = code.to_ascii_lowercase();
        if matches!(
            lower.as_str(),
            "context_length_exceeded"
                | "max_context_length_exceeded"
                | "prompt_tokens_exceeded"
                | "context_window_exceeded"
        ) || lower.contains("token")
        {
            return true;
        }
    }

    let lower_message = message.to_ascii_lowercase();
    const HINTS: [&str; 6] = [
        "context length",
        "context window",
        "token limit",
        "maximum output tokens",
        "max output tokens",
        "prompt is too long",
    ];
    HINTS.iter().any(|needle| lower_message.contains(needle))
}

/// Attempts to extract a model identifier quoted inside an error message.
pub(crate) fn extract_model_identifier(message: &str) -> Option<String> {
    for delimiter in ['`', '"', '\''] {
        if let Some(value) = between_delimiters(message, delimiter) {
            if !value.trim().is_empty() {
                return Some(value.trim().to_string());
            }
        }
    }
    None
}

fn between_delimiters(message: &str, delimiter: char) -> Option<String> {
    let start = message.find(delimiter)? + delimiter.len_utf8();
    let rest = &message[start..];
    let end = rest.find(delimiter)?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_limit_detected_from_code_or_message() {
        assert!(looks_like_token_limit_error(
            Some("context_length_exceeded"),
            "whatever"
        ));
        assert!(looks_like_token_limit_error(
            None,
            "Request prompt is too long for the context window"
        ));
        assert!(!looks_like_token_limit_error(Some("invalid_api_key"), "bad key"));
    }

    #[test]
    fn model_identifier_extracted_from_quotes() {
        assert_eq!(
            extract_model_identifier("The model `claude-bogus` was not found").as_deref(),
            Some("claude-bogus")
        );
        assert_eq!(
            extract_model_identifier("model \"gpt-x\" does not exist").as_deref(),
            Some("gpt-x")
        );
        assert_eq!(extract_model_identifier("no quotes here"), None);
    }

    #[test]
    fn provider_name_only_for_provider_errors() {
        let err = AiError::provider("anthropic", ProviderErrorKind::Auth, "nope");
        assert_eq!(err.provider_name(), Some("anthropic"));
        let err = AiError::ProviderNotFound {
            name: "anthropic".to_string(),
        };
        assert_eq!(err.provider_name(), None);
        assert_eq!(err.to_string(), "AI service 'anthropic' not available");
    }
}
