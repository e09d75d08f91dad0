//! Retry, backoff, timeout and cancellation behaviour on virtual time.

use std::time::Duration;

use textcal::extraction::{ExtractionError, RejectionReason};
use tokio::time::Instant;

use crate::support::{envelope, event, extractor, Reply, ScriptedProvider};

fn unavailable() -> Reply {
    Reply::Status(503, "service unavailable".to_owned())
}

fn valid_single() -> Reply {
    Reply::Text(
        event(
            "Call",
            "2025-05-28T10:00:00+02:00",
            "2025-05-28T11:00:00+02:00",
        )
        .to_string(),
    )
}

/// Virtual time only moves in timer-sized jumps, so the elapsed time is the
/// sum of timeouts and backoff delays, up to timer granularity.
fn assert_elapsed(started: Instant, secs: u64) {
    let elapsed = started.elapsed();
    let expected = Duration::from_secs(secs);
    assert!(
        elapsed >= expected && elapsed < expected.saturating_add(Duration::from_millis(100)),
        "elapsed {elapsed:?}, expected ~{secs}s"
    );
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_budget_with_linear_backoff() {
    let provider =
        ScriptedProvider::new([unavailable(), unavailable(), unavailable(), unavailable()]);
    let extractor = extractor(&provider, 3);
    let started = Instant::now();

    let err = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect_err("budget exhausted");

    assert!(matches!(err, ExtractionError::Transient { attempts: 4, .. }));
    assert_eq!(provider.calls(), 4);
    assert_elapsed(started, 12);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success_recovers() {
    let provider = ScriptedProvider::new([unavailable(), valid_single()]);
    let extractor = extractor(&provider, 3);
    let started = Instant::now();

    let outcome = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect("second attempt succeeds");

    assert!(outcome.into_record().is_some());
    assert_eq!(provider.calls(), 2);
    assert_elapsed(started, 2);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_one_attempt() {
    let provider = ScriptedProvider::new([unavailable()]);
    let extractor = extractor(&provider, 0);

    let err = extractor
        .extract_multiple_events("anything")
        .await
        .expect_err("no retry budget");

    assert!(matches!(err, ExtractionError::Transient { attempts: 1, .. }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_attempt_times_out_and_is_retried() {
    let provider = ScriptedProvider::new([Reply::Hang, valid_single()]);
    let extractor = extractor(&provider, 1);
    let started = Instant::now();

    let outcome = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect("retry after timeout succeeds");

    assert!(outcome.into_record().is_some());
    assert_eq!(provider.calls(), 2);
    assert_elapsed(started, 32);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_call_stops_further_attempts() {
    let provider = ScriptedProvider::new([unavailable(), valid_single()]);
    let extractor = extractor(&provider, 3);

    let abandoned = tokio::time::timeout(
        Duration::from_secs(1),
        extractor.extract_single_event("Call tomorrow at 10"),
    )
    .await;
    assert!(abandoned.is_err(), "call should still be backing off");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn quota_rejection_is_not_retried() {
    let provider = ScriptedProvider::new([Reply::Status(
        429,
        r#"{"error":{"code":"insufficient_quota","message":"You exceeded your current quota"}}"#
            .to_owned(),
    )]);
    let extractor = extractor(&provider, 3);

    let err = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect_err("rejected");

    assert!(matches!(
        err,
        ExtractionError::Rejected {
            reason: RejectionReason::Quota,
            ..
        }
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_is_not_retried_and_reads_differently_from_quota() {
    let provider = ScriptedProvider::new([Reply::Status(
        429,
        r#"{"error":{"code":"rate_limit_exceeded"}}"#.to_owned(),
    )]);
    let extractor = extractor(&provider, 3);

    let err = extractor
        .extract_multiple_events("anything")
        .await
        .expect_err("rejected");

    assert!(matches!(
        err,
        ExtractionError::Rejected {
            reason: RejectionReason::RateLimited,
            ..
        }
    ));
    assert!(err.user_message().contains("shortly"));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_is_not_retried() {
    let provider = ScriptedProvider::new([Reply::Status(401, "invalid api key".to_owned())]);
    let extractor = extractor(&provider, 3);

    let err = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect_err("rejected");

    assert!(matches!(
        err,
        ExtractionError::Rejected {
            reason: RejectionReason::Authentication,
            ..
        }
    ));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn undecodable_provider_envelope_is_not_retried() {
    let provider = ScriptedProvider::new([Reply::Malformed("missing choices[0]".to_owned())]);
    let extractor = extractor(&provider, 3);

    let err = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect_err("unexpected response");

    assert!(matches!(err, ExtractionError::UnexpectedResponse(_)));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_mode_parse_failure_is_terminal() {
    let provider = ScriptedProvider::new([Reply::Text("Sorry, no idea.".to_owned())]);
    let extractor = extractor(&provider, 3);

    let err = extractor
        .extract_single_event("Call tomorrow at 10")
        .await
        .expect_err("parse failure");

    assert!(matches!(err, ExtractionError::Parse { attempts: 1, .. }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn multi_mode_parse_failure_consumes_retry_budget() {
    let provider = ScriptedProvider::new([
        Reply::Text("Sorry, no idea.".to_owned()),
        envelope(vec![event(
            "Call",
            "2025-05-28T10:00:00+02:00",
            "2025-05-28T11:00:00+02:00",
        )]),
    ]);
    let extractor = extractor(&provider, 3);

    let batch = extractor
        .extract_multiple_events("Call tomorrow at 10")
        .await
        .expect("second attempt parses");

    assert_eq!(batch.records.len(), 1);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn multi_mode_parse_failures_exhaust_budget() {
    let garbage = || Reply::Text(r#"{"result":"none"}"#.to_owned());
    let provider = ScriptedProvider::new([garbage(), garbage(), garbage()]);
    let extractor = extractor(&provider, 2);

    let err = extractor
        .extract_multiple_events("anything")
        .await
        .expect_err("budget exhausted");

    assert!(matches!(err, ExtractionError::Parse { attempts: 3, .. }));
    assert_eq!(provider.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn malformed_array_entry_is_not_retried() {
    let provider = ScriptedProvider::new([Reply::Text(r#"{"events":[42]}"#.to_owned())]);
    let extractor = extractor(&provider, 3);

    let err = extractor
        .extract_multiple_events("anything")
        .await
        .expect_err("bad entry");

    assert!(matches!(err, ExtractionError::Parse { attempts: 1, .. }));
    assert_eq!(provider.calls(), 1);
}
