//! Request body normalization: sanitizes message content, expands
//! content-array messages into standalone text messages, rewrites `system`
//! role for the `o1` model family, and fills in a default `max_tokens`.

use crate::models::error::ProxyError;
use crate::proxy::sanitize::StringSanitizer;
use log::warn;
use serde_json::{json, Value};

/// Normalizes `request_body` in place, returning the effective model name
/// (empty string if absent) for callers that need it afterward.
pub fn normalize_request_body(
    request_body: &mut Value,
    default_max_tokens: u32,
) -> Result<String, ProxyError> {
    let sanitizer = StringSanitizer::new();
    let model = request_body
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    if let Some(messages) = request_body.get("messages").cloned() {
        let Value::Array(messages) = messages else {
            return Err(ProxyError::BadRequest("messages must be an array".to_string()));
        };

        let mut processed = Vec::with_capacity(messages.len());
        for mut message in messages {
            let role = message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("user")
                .to_string();
            let content = message.get("content").cloned().unwrap_or(Value::Null);

            match content {
                // An array of content parts expands into one message per
                // part, so there is no single surviving message to preserve
                // sibling fields (name, tool_call_id, ...) on.
                Value::Array(items) => {
                    for item in items {
                        let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");
                        if item_type != "text" {
                            return Err(ProxyError::BadRequest(
                                "only text type is supported in content array".to_string(),
                            ));
                        }
                        let text = item.get("text").and_then(Value::as_str).unwrap_or("");
                        let sanitized = sanitize_and_log(&sanitizer, text);
                        processed.push(json!({"role": role, "content": sanitized}));
                    }
                }
                // One message in, one message out: replace content in place
                // so sibling fields on the original message survive.
                Value::String(text) => {
                    let sanitized = sanitize_and_log(&sanitizer, &text);
                    message["content"] = json!(sanitized);
                    processed.push(message);
                }
                Value::Null => {
                    message["content"] = json!("");
                    processed.push(message);
                }
                _ => processed.push(message),
            }
        }

        if model.starts_with("o1") {
            for message in &mut processed {
                if message.get("role").and_then(Value::as_str) == Some("system") {
                    message["role"] = json!("user");
                }
            }
        }

        request_body["messages"] = Value::Array(processed);
    }

    if request_body.get("max_tokens").is_none() {
        request_body["max_tokens"] = json!(default_max_tokens);
    }

    Ok(model)
}

fn sanitize_and_log(sanitizer: &StringSanitizer, text: &str) -> String {
    let result = sanitizer.sanitize(text);
    if !result.warnings.is_empty() {
        warn!("string sanitization warnings: {:?}", result.warnings);
    }
    result.text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_string_content_in_place() {
        let mut body = json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}]
        });
        normalize_request_body(&mut body, 1024).unwrap();
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn string_content_keeps_sibling_fields_on_the_message() {
        let mut body = json!({
            "model": "gpt-4",
            "messages": [{
                "role": "tool",
                "content": "result",
                "tool_call_id": "call_123",
                "name": "lookup"
            }]
        });
        normalize_request_body(&mut body, 1024).unwrap();
        let message = &body["messages"][0];
        assert_eq!(message["content"], "result");
        assert_eq!(message["tool_call_id"], "call_123");
        assert_eq!(message["name"], "lookup");
    }

    #[test]
    fn expands_content_array_preserving_order() {
        let mut body = json!({
            "model": "gpt-4",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "first"},
                    {"type": "text", "text": "second"}
                ]
            }]
        });
        normalize_request_body(&mut body, 1024).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "first");
        assert_eq!(messages[1]["content"], "second");
    }

    #[test]
    fn rejects_non_text_content_array_items() {
        let mut body = json!({
            "model": "gpt-4",
            "messages": [{
                "role": "user",
                "content": [{"type": "image", "url": "http://x"}]
            }]
        });
        let err = normalize_request_body(&mut body, 1024).unwrap_err();
        assert!(matches!(err, ProxyError::BadRequest(_)));
    }

    #[test]
    fn o1_models_rewrite_system_to_user() {
        let mut body = json!({
            "model": "o1-preview",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "hi"}
            ]
        });
        normalize_request_body(&mut body, 1024).unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn non_o1_models_keep_system_role() {
        let mut body = json!({
            "model": "gpt-4",
            "messages": [{"role": "system", "content": "be terse"}]
        });
        normalize_request_body(&mut body, 1024).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[test]
    fn fills_default_max_tokens_when_absent() {
        let mut body = json!({"model": "gpt-4"});
        normalize_request_body(&mut body, 4096).unwrap();
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn preserves_explicit_max_tokens() {
        let mut body = json!({"model": "gpt-4", "max_tokens": 50});
        normalize_request_body(&mut body, 4096).unwrap();
        assert_eq!(body["max_tokens"], 50);
    }
}
