use crate::error::RelayError;
use crate::models::chat::{ ChatRequest, ChatRole, ChatTurn };
use serde_json::Value as JsonValue;

/// Turns a raw `/api/chat` body into a [`ChatRequest`].
///
/// Each turn is reduced to `role` and `content`; anything else the caller
/// sent is dropped. Turns are checked in order and the first bad one ends
/// validation, so the error always names a single index.
pub fn normalize_chat_request(
    body: &JsonValue,
    default_model: &str
) -> Result<ChatRequest, RelayError> {
    let raw_messages = body
        .get("messages")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| RelayError::InvalidRequest("messages array required".to_string()))?;

    let mut messages = Vec::with_capacity(raw_messages.len());
    for (index, raw) in raw_messages.iter().enumerate() {
        messages.push(normalize_turn(index, raw)?);
    }

    let model = select_model(body.get("model"), default_model)?;

    Ok(ChatRequest { messages, model })
}

fn normalize_turn(index: usize, raw: &JsonValue) -> Result<ChatTurn, RelayError> {
    let role = raw.get("role").filter(|v| is_present(v));
    let content = raw.get("content").filter(|v| is_present(v));

    let (role, content) = match (role, content) {
        (Some(role), Some(content)) => (role, content),
        _ => return Err(RelayError::InvalidMessageFormat { index }),
    };

    let role = role
        .as_str()
        .and_then(|s| s.parse::<ChatRole>().ok())
        .ok_or_else(|| RelayError::InvalidRole { index, role: render_role(role) })?;

    let content = content.as_str().ok_or(RelayError::InvalidMessageFormat { index })?;

    Ok(ChatTurn::new(role, content))
}

fn is_present(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn render_role(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn select_model(model: Option<&JsonValue>, default_model: &str) -> Result<String, RelayError> {
    match model {
        None | Some(JsonValue::Null) => Ok(default_model.to_string()),
        Some(JsonValue::String(s)) if s.is_empty() => Ok(default_model.to_string()),
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(RelayError::InvalidRequest("model must be a string".to_string())),
    }
}
