use std::time::Duration;

use serde::Deserialize;

use crate::error::{
    AiError, ProviderErrorKind, extract_model_identifier, looks_like_token_limit_error,
};

use super::types::AnthropicErrorDetail;

pub(crate) const PROVIDER: &str = "anthropic";

/// Parses error responses returned by the Anthropic Messages API.
pub(crate) fn parse_anthropic_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> AiError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<AnthropicErrorDetail>,
    }

    if let Ok(ErrorBody { error: Some(detail) }) = serde_json::from_str::<ErrorBody>(body) {
        let message = detail
            .message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        let kind = classify(Some(status), detail.kind.as_deref(), &message, retry_after);
        return AiError::provider(PROVIDER, kind, message);
    }

    // Fallback: if the payload cannot be parsed, surface the raw body.
    let kind = classify(Some(status), None, body, retry_after);
    AiError::provider(PROVIDER, kind, format!("status {status}: {body}"))
}

/// Converts an `error` event received mid-stream.
pub(crate) fn stream_error(detail: AnthropicErrorDetail) -> AiError {
    let message = detail
        .message
        .unwrap_or_else(|| "stream error event".to_string());
    let kind = classify(None, detail.kind.as_deref(), &message, None);
    AiError::provider(PROVIDER, kind, message)
}

fn classify(
    status: Option<u16>,
    error_type: Option<&str>,
    message: &str,
    retry_after: Option<Duration>,
) -> ProviderErrorKind {
    if looks_like_token_limit_error(None, message) {
        return ProviderErrorKind::TokenLimitExceeded;
    }

    match (status, error_type) {
        (Some(401 | 403), _) | (_, Some("authentication_error" | "permission_error")) => {
            ProviderErrorKind::Auth
        }
        (Some(429), _) | (_, Some("rate_limit_error")) => {
            ProviderErrorKind::RateLimited { retry_after }
        }
        (Some(404), _) | (_, Some("not_found_error")) => ProviderErrorKind::ModelNotFound {
            model: extract_model_identifier(message),
        },
        (Some(400 | 413 | 422), _) | (_, Some("invalid_request_error")) => {
            ProviderErrorKind::InvalidRequest
        }
        (Some(status), _) => ProviderErrorKind::Upstream { status },
        // Overloaded and api errors arrive mid-stream without a status.
        (None, Some("overloaded_error")) => ProviderErrorKind::Upstream { status: 529 },
        (None, _) => ProviderErrorKind::Upstream { status: 500 },
    }
}
