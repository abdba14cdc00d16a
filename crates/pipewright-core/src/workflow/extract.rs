//! Response normalization: turning a 2xx response body into step outputs.
//!
//! Provider-specific shapes are tried first, in the order of
//! `PROVIDER_EXTRACTORS`; generic per-output extraction runs last. Bodies
//! that are not JSON are assigned verbatim to every declared output.

use serde_json::{Map, Value};

/// Result of one provider-shape extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Shape matched; these are the final outputs.
    Outputs(Map<String, Value>),
    /// Shape matched and unwrapped a new body for generic extraction.
    Rewrite(Value),
    /// Shape did not match.
    NoMatch,
}

/// A pure extractor from response body to outputs.
pub type Extractor = fn(&Value, &[String]) -> Extraction;

/// Provider-shape extractors in priority order.
pub const PROVIDER_EXTRACTORS: &[(&str, Extractor)] = &[
    ("content_blocks", extract_content_blocks),
    ("chat_choices", extract_chat_choices),
];

/// Extract outputs from a raw response body.
pub fn extract_outputs(body: &str, outputs: &[String]) -> Map<String, Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(parsed) => extract_from_value(parsed, outputs),
        Err(_) => {
            tracing::debug!("response body is not JSON; using raw text");
            assign_all(outputs, Value::String(body.to_string()))
        }
    }
}

/// Extract outputs from an already-parsed body.
pub fn extract_from_value(body: Value, outputs: &[String]) -> Map<String, Value> {
    let mut body = body;
    for (name, extractor) in PROVIDER_EXTRACTORS {
        match extractor(&body, outputs) {
            Extraction::Outputs(map) => {
                tracing::debug!(extractor = name, "provider response shape matched");
                return map;
            }
            Extraction::Rewrite(inner) => {
                tracing::debug!(extractor = name, "provider response unwrapped to JSON");
                body = inner;
                break;
            }
            Extraction::NoMatch => {}
        }
    }
    extract_generic(&body, outputs)
}

/// `{"content": [{"text": ...}, ...]}`: the first block's text goes to every output.
pub fn extract_content_blocks(body: &Value, outputs: &[String]) -> Extraction {
    let text = body
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(Value::as_object)
        .and_then(|block| block.get("text"));
    match text {
        Some(text) => Extraction::Outputs(assign_all(outputs, text.clone())),
        None => Extraction::NoMatch,
    }
}

/// `{"choices": [{"message": {"content": "..."}}]}`: JSON content is unwrapped
/// for generic extraction; any other text goes to every output.
pub fn extract_chat_choices(body: &Value, outputs: &[String]) -> Extraction {
    let content = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str);
    match content {
        Some(content) => match serde_json::from_str::<Value>(content) {
            Ok(parsed) => Extraction::Rewrite(parsed),
            Err(_) => Extraction::Outputs(assign_all(outputs, Value::String(content.to_string()))),
        },
        None => Extraction::NoMatch,
    }
}

/// Each output takes the body field of the same name, or the whole body.
pub fn extract_generic(body: &Value, outputs: &[String]) -> Map<String, Value> {
    outputs
        .iter()
        .map(|name| {
            let value = body.get(name.as_str()).unwrap_or(body).clone();
            (name.clone(), value)
        })
        .collect()
}

fn assign_all(outputs: &[String], value: Value) -> Map<String, Value> {
    outputs
        .iter()
        .map(|name| (name.clone(), value.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
