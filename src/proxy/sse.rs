//! Parsing and synthesis of `text/event-stream` framing.

use log::warn;
use serde_json::{json, Value};

const DONE_FRAME: &str = "data: [DONE]";

/// Splits `text` on blank lines and JSON-decodes each `data: ...` frame.
/// Malformed JSON is logged and skipped rather than treated as fatal; the
/// terminal `[DONE]` marker is recognized and dropped, not decoded.
pub fn parse_events(text: &str) -> Vec<Value> {
    let mut events = Vec::new();
    for part in text.split("\n\n") {
        let part = part.trim();
        if part.is_empty() || part == DONE_FRAME {
            continue;
        }
        let Some(payload) = part.strip_prefix("data: ") else {
            continue;
        };
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => events.push(value),
            Err(e) => warn!("skipping malformed SSE frame: {e}"),
        }
    }
    events
}

/// Sums `usage.{prompt_tokens,completion_tokens,total_tokens}` across every
/// parsed event. Returns `None` if no event carries a `usage` object.
pub fn extract_usage(events: &[Value]) -> Option<(u64, u64, u64)> {
    let mut found = false;
    let (mut input, mut output, mut total) = (0u64, 0u64, 0u64);
    for event in events {
        if let Some(usage) = event.get("usage") {
            found = true;
            input += usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
            output += usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            total += usage.get("total_tokens").and_then(Value::as_u64).unwrap_or(0);
        }
    }
    found.then_some((input, output, total))
}

/// Converts an `o1`-family full JSON response (`choice.message`) into the
/// streamed shape (`choice.delta`), preserving `index` and `finish_reason`.
///
/// Field insertion order here matters: `serde_json`'s `preserve_order`
/// feature is enabled so the synthesized frames serialize in the same
/// `index, delta, finish_reason` / `id, created, model, choices` order a
/// real streamed completion uses, not alphabetical order.
pub fn convert_o1_response(data: &Value) -> Value {
    let Some(Value::Array(choices)) = data.get("choices") else {
        return data.clone();
    };

    let converted: Vec<Value> = choices
        .iter()
        .filter_map(|choice| {
            let message = choice.get("message")?;
            let mut converted_choice = json!({
                "index": choice.get("index").cloned().unwrap_or(json!(0)),
                "delta": {"content": message.get("content").cloned().unwrap_or(Value::Null)},
            });
            if let Some(finish_reason) = choice.get("finish_reason") {
                converted_choice["finish_reason"] = finish_reason.clone();
            }
            Some(converted_choice)
        })
        .collect();

    let mut result = data.clone();
    result["choices"] = Value::Array(converted);
    result
}

/// Wraps each choice of `data` in its own event envelope and terminates
/// with `data: [DONE]\n\n`.
pub fn convert_to_sse_events(data: &Value) -> Vec<String> {
    let mut frames = Vec::new();
    if let Some(Value::Array(choices)) = data.get("choices") {
        for choice in choices {
            let event = json!({
                "id": data.get("id").cloned().unwrap_or(json!("")),
                "created": data.get("created").cloned().unwrap_or(json!(0)),
                "model": data.get("model").cloned().unwrap_or(json!("")),
                "choices": [choice],
            });
            frames.push(format!("data: {}\n\n", event));
        }
    }
    frames.push(format!("{DONE_FRAME}\n\n"));
    frames
}
