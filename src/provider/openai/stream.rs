use crate::error::{AiError, ProviderErrorKind};
use crate::stream::TextDelta;

use super::error::detail_to_error;
use super::types::OpenAiStreamChunk;

/// Interprets one Chat Completions stream chunk.
///
/// `[DONE]` is consumed by the SSE decoder, so every payload reaching this
/// function is JSON. Chunks without `delta.content` (role preambles, the final
/// `finish_reason` chunk, usage-only chunks) are skipped.
pub(crate) fn parse_stream_chunk(data: &str, provider: &'static str) -> Result<TextDelta, AiError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data).map_err(|err| {
        AiError::provider(
            provider,
            ProviderErrorKind::MalformedResponse,
            format!("failed to parse stream chunk: {err}"),
        )
    })?;

    if let Some(detail) = chunk.error {
        return Err(detail_to_error(None, detail, None));
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());
    Ok(text.map_or(TextDelta::Skip, TextDelta::Text))
}
