use crate::error::{AiError, ProviderErrorKind};
use crate::stream::TextDelta;

use super::error::stream_error;
use super::types::AnthropicStreamEvent;

/// Interprets one Messages stream payload.
///
/// `content_block_delta` events with a `text_delta` yield text, `message_stop`
/// ends the stream and `error` events become provider errors. `ping`,
/// `message_start` and the remaining bookkeeping events are skipped.
pub(crate) fn parse_stream_event(data: &str, provider: &'static str) -> Result<TextDelta, AiError> {
    let event: AnthropicStreamEvent = serde_json::from_str(data).map_err(|err| {
        AiError::provider(
            provider,
            ProviderErrorKind::MalformedResponse,
            format!("failed to parse stream event: {err}"),
        )
    })?;

    match event.kind.as_str() {
        "content_block_delta" => {
            let text = event
                .delta
                .filter(|delta| delta.kind.as_deref().is_none_or(|kind| kind == "text_delta"))
                .and_then(|delta| delta.text)
                .filter(|text| !text.is_empty());
            Ok(text.map_or(TextDelta::Skip, TextDelta::Text))
        }
        "message_stop" => Ok(TextDelta::Finished),
        "error" => Err(stream_error(event.error.unwrap_or_default())),
        _ => Ok(TextDelta::Skip),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_yields_text() {
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Once"}}"#;
        assert_eq!(
            parse_stream_event(data, "anthropic").unwrap(),
            TextDelta::Text("Once".to_string())
        );
    }

    #[test]
    fn bookkeeping_events_are_skipped() {
        for data in [
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#,
        ] {
            assert_eq!(parse_stream_event(data, "anthropic").unwrap(), TextDelta::Skip);
        }
    }

    #[test]
    fn message_stop_finishes() {
        assert_eq!(
            parse_stream_event(r#"{"type":"message_stop"}"#, "anthropic").unwrap(),
            TextDelta::Finished
        );
    }

    #[test]
    fn error_event_becomes_provider_error() {
        let data = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = parse_stream_event(data, "anthropic").unwrap_err();
        assert_eq!(err.provider_name(), Some("anthropic"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_stream_event("{oops", "anthropic").unwrap_err();
        assert!(matches!(
            err,
            AiError::Provider {
                kind: ProviderErrorKind::MalformedResponse,
                ..
            }
        ));
    }
}
