//! Candidate validation and promotion to `EventRecord`.

use textcal::extraction::validator::{
    promote, validate, END_EQUALS_START, END_NOT_AFTER_START, MISSING_END, MISSING_START,
    MISSING_SUMMARY,
};
use textcal::types::CandidateEventProperties;

fn candidate(summary: &str, start: &str, end: &str) -> CandidateEventProperties {
    CandidateEventProperties {
        summary: Some(summary.to_owned()),
        description: None,
        location: None,
        start: Some(start.to_owned()),
        end: Some(end.to_owned()),
    }
}

#[test]
fn complete_candidate_is_valid_and_promotes() {
    let c = candidate(
        "  Dentist  ",
        "2025-05-28T14:00:00+02:00",
        "2025-05-28T15:00:00+02:00",
    );
    let report = validate(&c);
    assert!(report.is_valid(), "{:?}", report.violations());

    let record = promote(&c).expect("valid candidate promotes");
    assert_eq!(record.title(), "Dentist");
    assert_eq!(record.start_time().to_rfc3339(), "2025-05-28T14:00:00+02:00");
    assert_eq!(record.end_time().to_rfc3339(), "2025-05-28T15:00:00+02:00");
}

#[test]
fn empty_candidate_reports_every_missing_field_in_order() {
    let report = validate(&CandidateEventProperties::default());
    assert_eq!(
        report.violations(),
        [MISSING_SUMMARY, MISSING_START, MISSING_END]
    );
}

#[test]
fn whitespace_title_is_missing() {
    let c = candidate(
        "   ",
        "2025-05-28T14:00:00+02:00",
        "2025-05-28T15:00:00+02:00",
    );
    assert_eq!(validate(&c).violations(), [MISSING_SUMMARY]);
}

#[test]
fn missing_end_is_rejected_without_default_duration() {
    let mut c = candidate("Call", "2025-05-28T14:00:00+02:00", "");
    c.end = None;
    assert_eq!(validate(&c).violations(), [MISSING_END]);
}

#[test]
fn end_equal_to_start_has_its_own_message() {
    let c = candidate(
        "Call",
        "2025-05-28T14:00:00+02:00",
        "2025-05-28T14:00:00+02:00",
    );
    assert_eq!(validate(&c).violations(), [END_EQUALS_START]);
}

#[test]
fn same_instant_in_different_offsets_counts_as_equal() {
    let c = candidate(
        "Call",
        "2025-05-28T14:00:00+02:00",
        "2025-05-28T12:00:00Z",
    );
    assert_eq!(validate(&c).violations(), [END_EQUALS_START]);
}

#[test]
fn end_before_start_is_rejected() {
    let c = candidate(
        "Call",
        "2025-05-28T15:00:00+02:00",
        "2025-05-28T14:00:00+02:00",
    );
    assert_eq!(validate(&c).violations(), [END_NOT_AFTER_START]);
}

#[test]
fn unparseable_timestamp_is_reported_per_field() {
    let c = candidate("Call", "tomorrow at 3", "2025-05-28T14:00:00+02:00");
    let violations = validate(&c).into_violations();
    assert_eq!(violations.len(), 1);
    assert!(violations[0].starts_with("invalid date format for start time"));
}

#[test]
fn timestamp_without_offset_is_invalid() {
    let c = candidate("Call", "2025-05-28T14:00:00", "2025-05-28T15:00:00");
    let violations = validate(&c).into_violations();
    assert_eq!(violations.len(), 2);
    assert!(violations[1].starts_with("invalid date format for end time"));
}

#[test]
fn validation_is_idempotent() {
    let c = candidate("Call", "bad", "2025-05-28T14:00:00+02:00");
    assert_eq!(validate(&c), validate(&c));
}

#[test]
fn promote_refuses_invalid_candidate() {
    let c = candidate(
        "Call",
        "2025-05-28T15:00:00+02:00",
        "2025-05-28T14:00:00+02:00",
    );
    assert!(promote(&c).is_err());
}
