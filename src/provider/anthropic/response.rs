use tracing::debug;

use crate::provider::normalize::NormalizedResponse;
use crate::types::TokenUsage;

use super::error::PROVIDER;
use super::types::{AnthropicMessageResponse, AnthropicUsage};

/// 将 Messages 响应映射为供应商无关的结构
///
/// 输出文本取第一个 `text` 内容块，`model` 为发送请求时使用的模型
pub(crate) fn map_response(resp: AnthropicMessageResponse, model: String) -> NormalizedResponse {
    debug!(request_id = ?resp.id, stop_reason = ?resp.stop_reason, "anthropic response received");

    let text = resp
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .unwrap_or_default();

    NormalizedResponse {
        text,
        model,
        provider: PROVIDER,
        usage: resp.usage.map(convert_usage).unwrap_or_default(),
        stop_reason: resp.stop_reason,
    }
}

pub(crate) fn convert_usage(usage: AnthropicUsage) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> AnthropicMessageResponse {
        serde_json::from_str(body).expect("valid response body")
    }

    #[test]
    fn maps_first_text_block_and_usage() {
        let resp = parse(
            r#"{
  "id": "msg_01",
  "type": "message",
  "role": "assistant",
  "model": "claude-3-sonnet-20240229",
  "content": [
    {"type": "text", "text": "The rain fell."},
    {"type": "text", "text": "ignored"}
  ],
  "stop_reason": "end_turn",
  "usage": {"input_tokens": 25, "output_tokens": 7}
}"#,
        );
        let mapped = map_response(resp, "claude-3-sonnet-20240229".to_string());
        assert_eq!(mapped.text, "The rain fell.");
        assert_eq!(mapped.provider, "anthropic");
        assert_eq!(mapped.model, "claude-3-sonnet-20240229");
        assert_eq!(mapped.usage.input_tokens, Some(25));
        assert_eq!(mapped.usage.output_tokens, Some(7));
        assert_eq!(mapped.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn missing_usage_and_content_stay_empty() {
        let resp = parse(r#"{"content": [], "stop_reason": "max_tokens"}"#);
        let mapped = map_response(resp, "claude-3-haiku-20240307".to_string());
        assert_eq!(mapped.text, "");
        assert_eq!(mapped.usage, TokenUsage::default());
    }
}
