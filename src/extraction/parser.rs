//! Turns raw model output into [`CandidateEventProperties`].
//!
//! Keys are matched in a fixed order: the capitalized spelling (`Summary`)
//! first, then the lowercase one (`summary`), then any other casing
//! (`SUMMARY`) in key order. The first key holding a usable value wins.

use serde_json::{Map, Value};

use crate::types::CandidateEventProperties;

/// Key of the events array in multi-event output.
pub const EVENTS_KEY: &str = "events";

const EVENTS_KEY_CAPITALIZED: &str = "Events";

/// Why model output could not be turned into candidates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Text is not JSON, even after repair.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    /// Top-level JSON value is not an object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    /// Multi-event output without an `events` array, and not a bare event either.
    #[error("missing \"events\" array and response is not a single event")]
    MissingEnvelope,
    /// An entry of the `events` array is not an object.
    #[error("events[{index}] is a {found}, expected an object")]
    ElementNotObject {
        /// Position in the array.
        index: usize,
        /// JSON type found instead.
        found: &'static str,
    },
}

impl ParseError {
    /// Whether retrying the model call could help. A malformed array entry
    /// ends the call.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ElementNotObject { .. })
    }
}

/// Parse single-event output: exactly one JSON object.
///
/// # Errors
///
/// Returns [`ParseError::InvalidJson`] or [`ParseError::NotAnObject`].
pub fn parse_single(raw: &str) -> Result<CandidateEventProperties, ParseError> {
    match decode(raw)? {
        Value::Object(map) => Ok(candidate_from_object(&map)),
        other => Err(ParseError::NotAnObject(json_type(&other))),
    }
}

/// Parse multi-event output: `{"events": [ {...}, ... ]}`.
///
/// A missing or non-array envelope, or undecodable text, falls back to
/// reading the whole response as one bare event. An empty array is a valid
/// "nothing found" answer.
///
/// # Errors
///
/// Returns [`ParseError::ElementNotObject`] for a non-object array entry,
/// and [`ParseError::MissingEnvelope`] or [`ParseError::InvalidJson`] when
/// the fallback also fails.
pub fn parse_multiple(raw: &str) -> Result<Vec<CandidateEventProperties>, ParseError> {
    let decoded = decode(raw);
    let envelope = match &decoded {
        Ok(Value::Object(map)) => events_array(map),
        _ => None,
    };

    let Some(entries) = envelope else {
        tracing::debug!("events envelope missing, trying single-event fallback");
        return fallback_single(decoded);
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Object(map) => Ok(candidate_from_object(map)),
            other => Err(ParseError::ElementNotObject {
                index,
                found: json_type(other),
            }),
        })
        .collect()
}

fn events_array(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    [EVENTS_KEY_CAPITALIZED, EVENTS_KEY]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
}

fn fallback_single(
    decoded: Result<Value, ParseError>,
) -> Result<Vec<CandidateEventProperties>, ParseError> {
    match decoded? {
        Value::Object(map) => {
            let candidate = candidate_from_object(&map);
            if candidate.is_empty() {
                Err(ParseError::MissingEnvelope)
            } else {
                Ok(vec![candidate])
            }
        }
        _ => Err(ParseError::MissingEnvelope),
    }
}

/// Map one JSON object onto candidate fields.
pub fn candidate_from_object(map: &Map<String, Value>) -> CandidateEventProperties {
    CandidateEventProperties {
        summary: lookup(map, "Summary", "summary"),
        description: lookup(map, "Description", "description").filter(|s| !s.trim().is_empty()),
        location: lookup(map, "Location", "location").filter(|s| !s.trim().is_empty()),
        start: lookup(map, "Start", "start"),
        end: lookup(map, "End", "end"),
    }
}

/// Ordered key lookup: `capitalized`, then `lowercase`, then any other
/// ASCII casing of the same name.
///
/// Strings are returned as-is, numbers and booleans as their JSON text.
/// `null`, arrays and objects count as absent.
fn lookup(map: &Map<String, Value>, capitalized: &str, lowercase: &str) -> Option<String> {
    [capitalized, lowercase]
        .iter()
        .find_map(|key| map.get(*key).and_then(scalar_text))
        .or_else(|| {
            map.iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case(lowercase))
                .find_map(|(_, value)| scalar_text(value))
        })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Decode JSON, repairing common wrapping first.
///
/// Tries the text with any Markdown code fence removed, then the slice
/// between the first `{` and the last `}`.
fn decode(raw: &str) -> Result<Value, ParseError> {
    let unfenced = strip_code_fence(raw);
    match serde_json::from_str::<Value>(unfenced) {
        Ok(value) => Ok(value),
        Err(first) => {
            let sliced = unfenced
                .find('{')
                .zip(unfenced.rfind('}'))
                .filter(|(start, end)| start < end)
                .and_then(|(start, end)| unfenced.get(start..=end));
            match sliced.map(|s| serde_json::from_str::<Value>(s)) {
                Some(Ok(value)) => Ok(value),
                _ => Err(ParseError::InvalidJson(first.to_string())),
            }
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.find('\n').and_then(|i| rest.get(i..)).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
