//! Defensive decoding of model replies that are supposed to be JSON.
//!
//! Models asked for "JSON only" still wrap objects in markdown fences or add a
//! sentence of preamble. [`parse_lenient`] walks the fallbacks in a fixed order and
//! reports the outcome as a [`ParsedReply`] so callers branch explicitly.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::gateway::GatewayError;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("code fence pattern compiles")
});

/// Outcome of asking the gateway for a structured reply.
#[derive(Debug)]
pub enum ParsedReply<T> {
    /// The reply decoded into the expected shape
    Parsed(T),
    /// The gateway answered, but not with anything usable
    Fallback,
    /// The gateway call itself failed
    MalformedUpstream(GatewayError),
}

impl<T> ParsedReply<T> {
    /// Fold a gateway result and a decoder into a reply.
    pub fn from_completion(
        completion: Result<String, GatewayError>,
        decode: impl FnOnce(&str) -> Option<T>,
    ) -> Self {
        match completion {
            Ok(raw) => match decode(&raw) {
                Some(value) => ParsedReply::Parsed(value),
                None => {
                    warn!(raw = %raw, "Model reply could not be parsed");
                    ParsedReply::Fallback
                }
            },
            Err(e) => ParsedReply::MalformedUpstream(e),
        }
    }
}

/// Decode `raw` as `T`, accepting fenced or embedded JSON.
///
/// `accept` runs on every candidate value; a candidate it rejects counts as
/// unparsed and the next fallback is tried.
pub fn parse_lenient<T, F>(raw: &str, accept: F) -> Option<T>
where
    T: DeserializeOwned,
    F: Fn(&Value) -> bool,
{
    let decode = |text: &str| -> Option<T> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        if !accept(&value) {
            return None;
        }
        serde_json::from_value(value).ok()
    };

    if let Some(parsed) = decode(raw) {
        return Some(parsed);
    }
    debug!("Direct parsing failed, trying cleanup");

    let unfenced = strip_code_fence(raw);
    if let Some(parsed) = decode(unfenced) {
        return Some(parsed);
    }

    first_object_span(unfenced).and_then(decode)
}

/// Contents of the first markdown code fence, or the input if there is none.
pub fn strip_code_fence(raw: &str) -> &str {
    if !raw.contains("```") {
        return raw;
    }
    CODE_FENCE
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map_or(raw, |m| m.as_str())
}

/// The first balanced `{ ... }` span, skipping braces inside string literals.
pub fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Text of a scalar; `None` for null, arrays and objects.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Free text that may arrive as a string, a number or a list; lists are joined with newlines.
pub fn flexible_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => scalar_text(&other).unwrap_or_default(),
    })
}

/// A list of strings; a lone string becomes a one-element list and null an empty one.
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::Null => Vec::new(),
        other => scalar_text(&other).into_iter().collect(),
    })
}

/// A flat name-to-text map. Non-object values read as an empty map.
pub fn text_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries
            .into_iter()
            .map(|(key, value)| {
                let text = scalar_text(&value).unwrap_or_else(|| value.to_string());
                (key, text)
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Case-insensitive level enum; anything unrecognized becomes `T::default()`.
pub fn lenient_level<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = match Value::deserialize(deserializer)? {
        Value::String(level) => Value::String(level.trim().to_lowercase()),
        other => other,
    };
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Items of a list of objects; elements that do not decode are dropped,
/// a lone object is a one-element list and anything else an empty one.
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(decode_items(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Like [`lenient_list`], but null or a non-list value reads as `None`.
pub fn lenient_optional_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(decode_items(Value::deserialize(deserializer)?))
}

fn decode_items<T: DeserializeOwned>(value: Value) -> Option<Vec<T>> {
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    )
}

/// A flag that may arrive as a bool, a number or a word such as "yes"; null is false.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(word) => matches!(
            word.trim().to_lowercase().as_str(),
            "true" | "yes" | "y" | "1"
        ),
        _ => false,
    })
}

/// Optional free text; null and blank text read as `None`.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = flexible_text(deserializer)?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

/// A number that may arrive quoted; unreadable values become 0.
pub fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}
