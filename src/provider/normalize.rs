//! Collapses vendor responses into [`CompletionResult`].
//!
//! Each vendor module maps its wire response into a [`NormalizedResponse`]; this
//! module owns the rules shared by all of them.

use serde_json::Value;
use tracing::debug;

use crate::types::{CompletionResult, ResponseFormat, ResultMetadata, TokenUsage};

/// Vendor-neutral fields extracted from a raw response.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub text: String,
    pub model: String,
    pub provider: &'static str,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
}

impl NormalizedResponse {
    /// Builds the final result, parsing the text only when JSON was requested.
    pub fn into_result(self, format: ResponseFormat) -> CompletionResult {
        let structured_data = structured_payload(&self.text, format);
        if format == ResponseFormat::Json && structured_data.is_none() {
            debug!(
                provider = self.provider,
                model = %self.model,
                "json output requested but response text did not parse; returning raw text"
            );
        }

        CompletionResult {
            text: self.text,
            structured_data,
            suggested_actions: None,
            metadata: ResultMetadata {
                model: self.model,
                provider: self.provider.to_string(),
                usage: self.usage,
                stop_reason: self.stop_reason,
            },
        }
    }
}

/// Parses `text` as JSON when `format` asks for it; a parse miss yields `None`.
///
/// # Examples
///
/// ```
/// use novelflow_ai::provider::normalize::structured_payload;
/// use novelflow_ai::types::ResponseFormat;
///
/// assert!(structured_payload("{\"ok\":true}", ResponseFormat::Json).is_some());
/// assert!(structured_payload("not json", ResponseFormat::Json).is_none());
/// assert!(structured_payload("{\"ok\":true}", ResponseFormat::Text).is_none());
/// ```
pub fn structured_payload(text: &str, format: ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::Json => serde_json::from_str(text).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Output;
    use serde_json::json;

    fn normalized(text: &str) -> NormalizedResponse {
        NormalizedResponse {
            text: text.to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            provider: "openai",
            usage: TokenUsage {
                input_tokens: Some(12),
                output_tokens: Some(3),
            },
            stop_reason: Some("stop".to_string()),
        }
    }

    #[test]
    fn json_request_with_valid_output_is_parsed() {
        let result = normalized("{\"title\":\"Dusk\"}").into_result(ResponseFormat::Json);
        assert_eq!(result.structured_data, Some(json!({"title": "Dusk"})));
        assert_eq!(result.text, "{\"title\":\"Dusk\"}");
    }

    #[test]
    fn json_request_with_invalid_output_keeps_raw_text() {
        let result = normalized("not json").into_result(ResponseFormat::Json);
        assert_eq!(result.text, "not json");
        assert!(result.structured_data.is_none());
        assert_eq!(result.output(), Output::Raw("not json"));
    }

    #[test]
    fn metadata_copies_vendor_accounting() {
        let result = normalized("hello").into_result(ResponseFormat::Text);
        assert!(result.structured_data.is_none());
        assert!(result.suggested_actions.is_none());
        assert_eq!(result.metadata.provider, "openai");
        assert_eq!(result.metadata.model, "gpt-4-turbo-preview");
        assert_eq!(result.metadata.usage.input_tokens, Some(12));
        assert_eq!(result.metadata.usage.output_tokens, Some(3));
        assert_eq!(result.metadata.stop_reason.as_deref(), Some("stop"));
    }
}
