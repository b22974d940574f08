use tracing::debug;

use crate::provider::normalize::NormalizedResponse;
use crate::types::TokenUsage;

use super::error::PROVIDER;
use super::types::{OpenAiChatResponse, OpenAiUsage};

/// 将 Chat Completions 响应映射为供应商无关的结构
///
/// 只读取第一个 choice，message content 为 null 时视为空字符串
pub(crate) fn map_response(resp: OpenAiChatResponse, model: String) -> NormalizedResponse {
    debug!(request_id = ?resp.id, choices = resp.choices.len(), "openai response received");

    let (text, stop_reason) = match resp.choices.into_iter().next() {
        Some(choice) => (
            choice
                .message
                .and_then(|message| message.content)
                .unwrap_or_default(),
            choice.finish_reason,
        ),
        None => (String::new(), None),
    };

    NormalizedResponse {
        text,
        model,
        provider: PROVIDER,
        usage: resp.usage.map(convert_usage).unwrap_or_default(),
        stop_reason,
    }
}

pub(crate) fn convert_usage(usage: OpenAiUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response_text() -> OpenAiChatResponse {
        serde_json::from_str(
            r#"{
  "id": "chatcmpl-123",
  "object": "chat.completion",
  "created": 1677652288,
  "model": "gpt-4-0125-preview",
  "choices": [{
    "index": 0,
    "message": {"role": "assistant", "content": "{\"mood\":\"tense\"}"},
    "finish_reason": "stop"
  }],
  "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
}"#,
        )
        .expect("valid response body")
    }

    #[test]
    fn map_response_text_only() {
        let mapped = map_response(sample_response_text(), "gpt-4-turbo-preview".to_string());
        assert_eq!(mapped.text, "{\"mood\":\"tense\"}");
        assert_eq!(mapped.provider, "openai");
        assert_eq!(mapped.model, "gpt-4-turbo-preview");
        assert_eq!(
            mapped.usage,
            TokenUsage {
                input_tokens: Some(9),
                output_tokens: Some(12)
            }
        );
        assert_eq!(mapped.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn null_content_becomes_empty_text() {
        let resp: OpenAiChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":null},"finish_reason":"content_filter"}]}"#,
        )
        .unwrap();
        let mapped = map_response(resp, "gpt-4o".to_string());
        assert_eq!(mapped.text, "");
        assert_eq!(mapped.usage, TokenUsage::default());
        assert_eq!(mapped.stop_reason.as_deref(), Some("content_filter"));
    }
}
