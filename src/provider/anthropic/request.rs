use serde_json::{Map, Value, json};

use crate::error::AiError;
use crate::provider::ResolvedOptions;
use crate::types::{ChatRequest, Role};

/// 构建 Anthropic Messages 请求体
///
/// system 指令与历史中的 system 消息折叠为顶层 system，
/// Anthropic 不接受 messages 中出现 system 角色
pub(crate) fn build_anthropic_body(
    request: &ChatRequest,
    options: &ResolvedOptions,
    stream: bool,
) -> Result<Value, AiError> {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(options.model.clone()));

    let mut system_texts: Vec<&str> = request
        .options
        .system_prompt
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .into_iter()
        .collect();
    let mut messages = Vec::new();
    for message in &request.messages {
        match message.role {
            Role::System => system_texts.push(&message.content),
            Role::User | Role::Assistant => messages.push(json!({
                "role": message.role.as_str(),
                "content": message.content,
            })),
        }
    }

    if messages.is_empty() {
        return Err(AiError::validation(
            "Anthropic Messages request requires at least one user/assistant message",
        ));
    }
    body.insert("messages".to_string(), Value::Array(messages));

    if !system_texts.is_empty() {
        body.insert("system".to_string(), Value::String(system_texts.join("\n\n")));
    }

    body.insert("max_tokens".to_string(), Value::from(options.max_tokens));
    body.insert("temperature".to_string(), Value::from(options.temperature));
    body.insert("stream".to_string(), Value::Bool(stream));

    Ok(Value::Object(body))
}
