//! Gatekeeper between candidate fields and [`EventRecord`].
//!
//! Validation is a pure function of the candidate. Every violation is
//! collected, none short-circuits the rest.

use chrono::{DateTime, FixedOffset};

use crate::types::{CandidateEventProperties, EventRecord};

use super::ExtractionError;

/// Title is missing or blank.
pub const MISSING_SUMMARY: &str = "title/summary is required";
/// Start is missing.
pub const MISSING_START: &str = "start time is required";
/// End is missing.
pub const MISSING_END: &str = "end time is required";
/// End is strictly before start.
pub const END_NOT_AFTER_START: &str = "end time must be after start time";
/// End equals start.
pub const END_EQUALS_START: &str = "end time must be different from start time";

/// Ordered list of violations for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<String>,
}

impl ValidationReport {
    /// True when no rule was violated.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations in rule order.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Take ownership of the violations.
    pub fn into_violations(self) -> Vec<String> {
        self.violations
    }
}

/// Check a candidate against every rule.
///
/// A missing end is always a violation here; no default duration is
/// applied at this boundary.
pub fn validate(candidate: &CandidateEventProperties) -> ValidationReport {
    let mut violations = Vec::new();

    if candidate
        .summary
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        violations.push(MISSING_SUMMARY.to_owned());
    }

    let start = check_timestamp("start", candidate.start.as_deref(), MISSING_START, &mut violations);
    let end = check_timestamp("end", candidate.end.as_deref(), MISSING_END, &mut violations);

    if let (Some(start), Some(end)) = (start, end) {
        if end == start {
            violations.push(END_EQUALS_START.to_owned());
        } else if end < start {
            violations.push(END_NOT_AFTER_START.to_owned());
        }
    }

    ValidationReport { violations }
}

fn check_timestamp(
    field: &str,
    value: Option<&str>,
    missing: &str,
    violations: &mut Vec<String>,
) -> Option<DateTime<FixedOffset>> {
    let Some(text) = value.filter(|v| !v.trim().is_empty()) else {
        violations.push(missing.to_owned());
        return None;
    };
    match parse_timestamp(text) {
        Ok(ts) => Some(ts),
        Err(reason) => {
            violations.push(format!("invalid date format for {field} time: {reason}"));
            None
        }
    }
}

/// Parse an ISO-8601 timestamp that carries an explicit UTC offset.
///
/// Accepts RFC 3339 (`2025-05-28T14:00:00+02:00`) and the seconds-less form
/// (`2025-05-28T14:00+02:00`). Bare local times are rejected.
///
/// # Errors
///
/// Returns the parser's explanation of the first accepted form's failure.
pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, String> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .or_else(|rfc_err| {
            DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%:z").map_err(|_| rfc_err)
        })
        .map_err(|e| format!("{text:?} ({e})"))
}

/// Convert a candidate that passed [`validate`] into an [`EventRecord`].
///
/// # Errors
///
/// Returns [`ExtractionError::Internal`] if the candidate does not actually
/// satisfy the rules.
pub fn promote(candidate: &CandidateEventProperties) -> Result<EventRecord, ExtractionError> {
    let field = |value: &Option<String>, name: &str| {
        value
            .as_deref()
            .ok_or_else(|| ExtractionError::Internal(format!("validated candidate lacks {name}")))
            .map(str::to_owned)
    };
    let summary = field(&candidate.summary, "summary")?;
    let start = parse_timestamp(&field(&candidate.start, "start")?)
        .map_err(|e| ExtractionError::Internal(format!("validated start failed to parse: {e}")))?;
    let end = parse_timestamp(&field(&candidate.end, "end")?)
        .map_err(|e| ExtractionError::Internal(format!("validated end failed to parse: {e}")))?;

    EventRecord::new(
        &summary,
        candidate.description.clone(),
        candidate.location.clone(),
        start,
        end,
    )
    .map_err(|e| ExtractionError::Internal(format!("validated candidate rejected: {e}")))
}
