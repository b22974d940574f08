use serde_json::{Map, Value, json};

use crate::provider::ResolvedOptions;
use crate::types::{ChatRequest, ResponseFormat};

/// 构建 Chat Completions 请求体
///
/// system 指令作为首条 system 消息，历史消息保留原角色；
/// [`ResponseFormat::Json`] 时开启供应商 JSON 模式
pub(crate) fn build_openai_body(
    request: &ChatRequest,
    options: &ResolvedOptions,
    format: ResponseFormat,
    stream: bool,
) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), Value::String(options.model.clone()));

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request
        .options
        .system_prompt
        .as_deref()
        .filter(|text| !text.trim().is_empty())
    {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.extend(request.messages.iter().map(|message| {
        json!({
            "role": message.role.as_str(),
            "content": message.content,
        })
    }));
    body.insert("messages".to_string(), Value::Array(messages));

    body.insert("temperature".to_string(), Value::from(options.temperature));
    body.insert("max_tokens".to_string(), Value::from(options.max_tokens));

    if format == ResponseFormat::Json {
        body.insert(
            "response_format".to_string(),
            json!({"type": "json_object"}),
        );
    }

    if stream {
        body.insert("stream".to_string(), Value::Bool(true));
    }

    Value::Object(body)
}
