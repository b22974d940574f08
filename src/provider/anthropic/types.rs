use serde::Deserialize;

/// Non-streaming response payload returned by Anthropic Messages.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicMessageResponse {
    /// Some compatibility layers omit the `id`, so keep it optional.
    #[serde(default)]
    pub(crate) id: Option<String>,
    /// Ordered list of content blocks.
    #[serde(default)]
    pub(crate) content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    pub(crate) stop_reason: Option<String>,
    #[serde(default)]
    pub(crate) usage: Option<AnthropicUsage>,
}

/// Single content block; only `text` blocks carry caller-visible output.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

/// Usage counters returned by Anthropic.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct AnthropicUsage {
    #[serde(default)]
    pub(crate) input_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) output_tokens: Option<u64>,
}

/// One `data:` payload of the Messages event stream.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) delta: Option<AnthropicStreamDelta>,
    #[serde(default)]
    pub(crate) error: Option<AnthropicErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnthropicStreamDelta {
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

/// Error object shared by error responses and `error` stream events.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AnthropicErrorDetail {
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}
