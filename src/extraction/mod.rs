//! Text → validated calendar events.
//!
//! One extraction call runs: prompt construction (sync) → model call with
//! timeout and retries → response parsing → per-candidate validation.
//! [`EventExtractor`] holds only immutable state, so one instance can serve
//! concurrent calls.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::clock::{PromptContext, ReferenceClock};
use crate::config::{BatchPolicy, ExtractionSettings};
use crate::providers::router::build_provider;
use crate::providers::LlmProvider;
use crate::types::{CandidateEventProperties, EventRecord};

pub mod client;
pub mod error;
pub mod parser;
pub mod prompt;
pub mod validator;

pub use client::ExtractionClient;
pub use error::{AttemptError, ExtractionError, RejectionReason};

/// Whether the model should return one event or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionMode {
    /// One event object.
    Single,
    /// An `{"events": [...]}` envelope.
    Multiple,
}

/// A candidate that failed validation, with the reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedCandidate {
    /// Fields as the model produced them.
    pub candidate: CandidateEventProperties,
    /// Human-readable violations, in rule order.
    pub violations: Vec<String>,
}

/// Outcome of a single-event call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleExtraction {
    /// The event passed validation.
    Valid(EventRecord),
    /// The model answered but the event is unusable as-is.
    Invalid(RejectedCandidate),
}

impl SingleExtraction {
    /// The record, if valid.
    pub fn into_record(self) -> Option<EventRecord> {
        match self {
            Self::Valid(record) => Some(record),
            Self::Invalid(_) => None,
        }
    }
}

/// Outcome of a multi-event call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchExtraction {
    /// Valid records in input order.
    pub records: Vec<EventRecord>,
    /// Candidates that failed validation, in input order.
    pub rejected: Vec<RejectedCandidate>,
    /// Valid records held back by [`BatchPolicy::AllOrNothing`].
    pub withheld: usize,
}

impl BatchExtraction {
    /// True when every candidate became a record.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Public entry point of the extraction pipeline.
#[derive(Clone)]
pub struct EventExtractor {
    client: ExtractionClient,
    clock: Arc<dyn ReferenceClock>,
    settings: ExtractionSettings,
}

impl std::fmt::Debug for EventExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventExtractor")
            .field("client", &self.client)
            .field("batch_policy", &self.settings.batch_policy())
            .finish()
    }
}

impl EventExtractor {
    /// Assemble an extractor from parts.
    pub fn new(
        settings: ExtractionSettings,
        provider: Arc<dyn LlmProvider>,
        clock: Arc<dyn ReferenceClock>,
    ) -> Self {
        Self {
            client: ExtractionClient::new(provider, &settings),
            clock,
            settings,
        }
    }

    /// Build an extractor whose provider is chosen from the settings' model spec.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Configuration`] if the model spec names an
    /// unknown provider.
    pub fn from_settings(
        settings: ExtractionSettings,
        clock: Arc<dyn ReferenceClock>,
    ) -> Result<Self, ExtractionError> {
        let provider =
            build_provider(&settings).map_err(|e| ExtractionError::Configuration(e.to_string()))?;
        Ok(Self::new(settings, provider, clock))
    }

    /// Settings this extractor was built with.
    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extract exactly one event.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::InvalidInput`] for blank text (no model call is
    /// made), otherwise any terminal provider or parse failure. Parse
    /// failures are not retried in this mode.
    #[instrument(skip_all, fields(mode = "single", chars = text.chars().count()))]
    pub async fn extract_single_event(
        &self,
        text: &str,
    ) -> Result<SingleExtraction, ExtractionError> {
        let text = require_text(text)?;
        let mode = ExtractionMode::Single;
        let context = PromptContext::capture(self.clock.as_ref());
        let messages = prompt::build_messages(text, mode, &context);
        let params = self.settings.call_parameters(mode);
        let client = &self.client;
        let messages = &messages;

        let candidate = client
            .run_with_retries(move |_| async move {
                let raw = client.request(messages, params).await?;
                parser::parse_single(&raw).map_err(|e| AttemptError::parse(&e, false))
            })
            .await?;

        Ok(match classify(candidate)? {
            Ok(record) => {
                info!("extracted event");
                SingleExtraction::Valid(record)
            }
            Err(rejected) => {
                warn!(
                    violations = rejected.violations.len(),
                    "extracted event failed validation"
                );
                SingleExtraction::Invalid(rejected)
            }
        })
    }

    /// Extract every event mentioned in the text.
    ///
    /// An empty result is a valid answer, not an error.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::InvalidInput`] for blank text (no model call is
    /// made), otherwise any terminal provider or parse failure. Envelope
    /// parse failures consume retry budget.
    #[instrument(skip_all, fields(mode = "multiple", chars = text.chars().count()))]
    pub async fn extract_multiple_events(
        &self,
        text: &str,
    ) -> Result<BatchExtraction, ExtractionError> {
        let text = require_text(text)?;
        let mode = ExtractionMode::Multiple;
        let context = PromptContext::capture(self.clock.as_ref());
        let messages = prompt::build_messages(text, mode, &context);
        let params = self.settings.call_parameters(mode);
        let client = &self.client;
        let messages = &messages;

        let candidates = client
            .run_with_retries(move |_| async move {
                let raw = client.request(messages, params).await?;
                parser::parse_multiple(&raw).map_err(|e| AttemptError::parse(&e, e.is_retryable()))
            })
            .await?;
        debug!(candidates = candidates.len(), "parsed candidates");

        let mut batch = BatchExtraction::default();
        for candidate in candidates {
            match classify(candidate)? {
                Ok(record) => batch.records.push(record),
                Err(rejected) => batch.rejected.push(rejected),
            }
        }

        if self.settings.batch_policy() == BatchPolicy::AllOrNothing && !batch.is_complete() {
            batch.withheld = batch.records.len();
            batch.records.clear();
        }

        info!(
            records = batch.records.len(),
            rejected = batch.rejected.len(),
            withheld = batch.withheld,
            "extracted events"
        );
        Ok(batch)
    }
}

fn require_text(text: &str) -> Result<&str, ExtractionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::InvalidInput);
    }
    Ok(trimmed)
}

/// Validate one candidate; promote it or hand back the violations.
fn classify(
    candidate: CandidateEventProperties,
) -> Result<Result<EventRecord, RejectedCandidate>, ExtractionError> {
    let report = validator::validate(&candidate);
    if !report.is_valid() {
        return Ok(Err(RejectedCandidate {
            candidate,
            violations: report.into_violations(),
        }));
    }
    validator::promote(&candidate).map(Ok)
}
