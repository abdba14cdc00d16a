//! `{{path}}` template resolution against the accumulated output store.
//!
//! Expressions are dotted/bracketed paths (`a.b[0].c`). Resolution walks the
//! context one segment at a time. When the walk hits a scalar with segments
//! left over and the base variable itself is a scalar, the base scalar is the
//! result: upstream steps that collapsed a structured response into plain
//! text still satisfy references into the old structure.
//!
//! Unresolvable expressions are left in place verbatim.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("expression pattern is valid"));

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve every `{{expression}}` in a template tree against `context`.
///
/// Objects and arrays are resolved element-wise; non-string scalars pass
/// through unchanged.
pub fn resolve_template(template: &Value, context: &Map<String, Value>) -> Value {
    match template {
        Value::String(s) => resolve_string(s, context),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_template(item, context))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), resolve_template(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve one path expression (without braces). `None` means not found.
pub fn resolve_path<'a>(expression: &str, context: &'a Map<String, Value>) -> Option<&'a Value> {
    let segments = path_segments(expression);
    let (base_name, rest) = segments.split_first()?;
    let base = context.get(*base_name)?;

    let mut current = base;
    for segment in rest {
        let next = match current {
            Value::Array(items) => parse_index(segment).and_then(|index| items.get(index)),
            Value::Object(fields) => fields.get(*segment),
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                if is_scalar(base) {
                    tracing::debug!(
                        expression,
                        "path continues past a scalar; using base variable"
                    );
                    return Some(base);
                }
                None
            }
            Value::Null => None,
        };
        current = next?;
    }

    (!current.is_null()).then_some(current)
}

/// Text form used when a resolved value is spliced into surrounding text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn resolve_string(template: &str, context: &Map<String, Value>) -> Value {
    let Some(caps) = EXPRESSION_RE.captures(template) else {
        return Value::String(template.to_string());
    };

    // Exactly one expression and nothing else: keep the native type.
    if caps[0].len() == template.len() {
        return match resolve_path(&caps[1], context) {
            Some(value) => value.clone(),
            None => Value::String(template.to_string()),
        };
    }

    let spliced = EXPRESSION_RE.replace_all(template, |caps: &Captures<'_>| {
        match resolve_path(&caps[1], context) {
            Some(value) => stringify(value),
            None => caps[0].to_string(),
        }
    });
    Value::String(spliced.into_owned())
}

/// Array index segment: ASCII digits only, so `+1` or `-1` are not indices.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn path_segments(expression: &str) -> Vec<&str> {
    expression
        .trim()
        .split(['.', '[', ']'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
