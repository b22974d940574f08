use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiChatResponse {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiResponseChoice>,
    #[serde(default)]
    pub(crate) usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiResponseChoice {
    #[serde(default)]
    pub(crate) message: Option<OpenAiResponseMessage>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiResponseMessage {
    /// `null` when the model refused or only emitted tool calls.
    #[serde(default)]
    pub(crate) content: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub(crate) struct OpenAiUsage {
    #[serde(default)]
    pub(crate) prompt_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiStreamChunk {
    #[serde(default)]
    pub(crate) choices: Vec<OpenAiStreamChoice>,
    /// Some gateways report failures inside the event stream.
    #[serde(default)]
    pub(crate) error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiStreamChoice {
    #[serde(default)]
    pub(crate) delta: Option<OpenAiStreamDelta>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct OpenAiStreamDelta {
    #[serde(default)]
    pub(crate) content: Option<String>,
}

/// Error object of an OpenAI error response.
#[derive(Debug, Deserialize, Clone, Default)]
pub(crate) struct OpenAiErrorDetail {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    /// Either a string such as `invalid_api_key` or, on some gateways, a number.
    #[serde(default)]
    pub(crate) code: Option<serde_json::Value>,
}
