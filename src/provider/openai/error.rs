use std::time::Duration;

use serde::Deserialize;

use crate::error::{
    AiError, ProviderErrorKind, extract_model_identifier, looks_like_token_limit_error,
};

use super::types::OpenAiErrorDetail;

pub(crate) const PROVIDER: &str = "openai";

/// Parses error responses returned by the Chat Completions API.
pub(crate) fn parse_openai_error(
    status: u16,
    body: &str,
    retry_after: Option<Duration>,
) -> AiError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<OpenAiErrorDetail>,
    }

    if let Ok(ErrorBody { error: Some(detail) }) = serde_json::from_str::<ErrorBody>(body) {
        return detail_to_error(Some(status), detail, retry_after);
    }

    let kind = match status {
        401 | 403 => ProviderErrorKind::Auth,
        429 => ProviderErrorKind::RateLimited { retry_after },
        status => ProviderErrorKind::Upstream { status },
    };
    AiError::provider(PROVIDER, kind, format!("status {status}: {body}"))
}

pub(crate) fn detail_to_error(
    status: Option<u16>,
    detail: OpenAiErrorDetail,
    retry_after: Option<Duration>,
) -> AiError {
    let mut message = detail
        .message
        .unwrap_or_else(|| "unknown error".to_string());
    let code = detail.code.as_ref().and_then(|value| match value {
        serde_json::Value::String(code) => Some(code.clone()),
        serde_json::Value::Number(code) => Some(code.to_string()),
        _ => None,
    });
    if let Some(code) = &code {
        message = format!("{message} ({code})");
    }
    let code_hint = code.as_deref();

    let kind = if looks_like_token_limit_error(code_hint, &message) {
        ProviderErrorKind::TokenLimitExceeded
    } else if status == Some(404) || code_hint == Some("model_not_found") {
        ProviderErrorKind::ModelNotFound {
            model: extract_model_identifier(&message),
        }
    } else {
        match (status, detail.kind.as_deref()) {
            (Some(401 | 403), _) | (_, Some("authentication_error")) => ProviderErrorKind::Auth,
            (Some(429), _) | (_, Some("rate_limit_exceeded" | "insufficient_quota")) => {
                ProviderErrorKind::RateLimited { retry_after }
            }
            (Some(400 | 422), _) | (_, Some("invalid_request_error")) => {
                ProviderErrorKind::InvalidRequest
            }
            (Some(status), _) => ProviderErrorKind::Upstream { status },
            (None, _) => ProviderErrorKind::Upstream { status: 500 },
        }
    };
    AiError::provider(PROVIDER, kind, message)
}
