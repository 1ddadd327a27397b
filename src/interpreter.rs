//! Response interpreter
//!
//! Parses raw completions into typed `AgentResponse` values. Malformed input
//! is a classified outcome, never a propagated fault; this is the seam that
//! lets the orchestrator retry once or degrade to plain-text handling.

use crate::models::{AgentResponse, FieldValue};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Primitive types a schema field can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Date,
    /// Closed set of accepted variants; the coerced value is the canonical
    /// variant spelling.
    Enum(&'static [&'static str]),
    Text,
}

/// One expected named field in an agent's output.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Per-agent set of expected fields, in declaration order. Declaration order
/// determines which offending field an `Invalid` outcome names.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub fields: &'static [FieldSpec],
}

impl ResponseSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }
}

/// Interpret one raw completion against an optional schema.
///
/// State machine per call: Received → {Structured | Unstructured | Invalid},
/// terminal. A retry is a brand-new call on fresh text.
pub fn interpret(raw_text: &str, schema: Option<&ResponseSchema>) -> AgentResponse {
    let Some(schema) = schema else {
        return AgentResponse::Unstructured { text: raw_text.trim().to_string() };
    };

    if raw_text.trim().is_empty() {
        return AgentResponse::Invalid {
            raw_text: raw_text.to_string(),
            reason: "empty completion".to_string(),
        };
    }

    // Tolerant extraction: a fenced block wins, otherwise the first balanced
    // JSON object anywhere in the prose, otherwise an empty object (so the
    // first required field is named as missing).
    let object = extract_json_object(raw_text).unwrap_or_else(|| serde_json::Map::new().into());

    let keyed = match object.as_object() {
        Some(map) => normalize_keys(map),
        None => BTreeMap::new(),
    };

    let mut fields = BTreeMap::new();

    for spec in schema.fields {
        match keyed.get(&normalize_key(spec.name)) {
            Some(value) => match coerce(value, spec.kind) {
                Some(coerced) => {
                    fields.insert(spec.name.to_string(), coerced);
                }
                None if spec.required => {
                    return AgentResponse::Invalid {
                        raw_text: raw_text.to_string(),
                        reason: format!(
                            "required field `{}` is not a valid {}",
                            spec.name,
                            kind_name(spec.kind)
                        ),
                    };
                }
                None => {
                    debug!(field = spec.name, "Dropping uncoercible optional field");
                }
            },
            None if spec.required => {
                return AgentResponse::Invalid {
                    raw_text: raw_text.to_string(),
                    reason: format!("missing required field `{}`", spec.name),
                };
            }
            None => {}
        }
    }

    AgentResponse::Structured { fields }
}

fn kind_name(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Number => "number",
        FieldKind::Date => "date",
        FieldKind::Enum(_) => "enum value",
        FieldKind::Text => "text value",
    }
}

/// Pull a JSON object out of a completion that may wrap it in markdown
/// fences or surrounding prose.
fn extract_json_object(raw: &str) -> Option<Value> {
    // Fenced block first: ```json ... ``` or a bare ``` fence.
    for fence in ["```json", "```"] {
        if let Some(start) = raw.find(fence) {
            let after = &raw[start + fence.len()..];
            if let Some(end) = after.find("```") {
                if let Some(value) = first_balanced_object(&after[..end]) {
                    return Some(value);
                }
            }
        }
    }

    first_balanced_object(raw)
}

/// Scan for the first balanced `{ ... }` span that parses as JSON.
fn first_balanced_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + 1];
                    return serde_json::from_str(candidate).ok();
                }
            }
            _ => {}
        }
    }

    None
}

/// Case- and separator-insensitive key lookup: `Target Amount`,
/// `target_amount` and `targetAmount` all land on the same key.
fn normalize_key(key: &str) -> String {
    let mut normalized = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            ' ' | '_' | '-' => {}
            c => normalized.extend(c.to_lowercase()),
        }
    }
    normalized
}

fn normalize_keys(map: &serde_json::Map<String, Value>) -> BTreeMap<String, Value> {
    map.iter()
        .map(|(k, v)| (normalize_key(k), v.clone()))
        .collect()
}

fn coerce(value: &Value, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Number => coerce_number(value).map(FieldValue::Number),
        FieldKind::Date => coerce_date(value).map(FieldValue::Date),
        FieldKind::Enum(variants) => coerce_enum(value, variants).map(FieldValue::Text),
        FieldKind::Text => coerce_text(value).map(FieldValue::Text),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// Accepted date spellings, most common first. Models mix ISO dates,
/// US-style dates and written-out dates freely.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%B %d, %Y", "%d %B %Y"];

fn coerce_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn coerce_enum(value: &Value, variants: &'static [&'static str]) -> Option<String> {
    let s = value.as_str()?;
    let normalized = normalize_key(s);
    variants
        .iter()
        .find(|v| normalize_key(v) == normalized)
        .map(|v| v.to_string())
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
