//! Event record model shared by extraction output and calendar-file generation.
//!
//! [`CandidateEventProperties`] is the raw, possibly incomplete shape a model
//! emits. [`EventRecord`] is the calendar-ready value that only exists once
//! its invariants hold: a non-empty title and an end strictly after the start.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Unvalidated event fields as decoded from one JSON object in model output.
///
/// Every field is optional; the validator decides what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CandidateEventProperties {
    /// Event title.
    pub summary: Option<String>,
    /// Free-form notes.
    pub description: Option<String>,
    /// Where the event happens.
    pub location: Option<String>,
    /// Start as ISO-8601 text with UTC offset.
    pub start: Option<String>,
    /// End as ISO-8601 text with UTC offset.
    pub end: Option<String>,
}

impl CandidateEventProperties {
    /// Returns true when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.start.is_none()
            && self.end.is_none()
    }
}

/// Reasons an [`EventRecord`] cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Title is empty after trimming.
    #[error("title must not be empty")]
    EmptyTitle,
    /// End is equal to or before start.
    #[error("end time {end} is not after start time {start}")]
    EndNotAfterStart {
        /// Offending start.
        start: DateTime<FixedOffset>,
        /// Offending end.
        end: DateTime<FixedOffset>,
    },
}

/// A validated, immutable calendar event.
///
/// Edits go through the `with_*` methods, which return a new record and
/// re-check the invariants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    title: String,
    description: Option<String>,
    location: Option<String>,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
}

impl EventRecord {
    /// Build a record, trimming the title.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the title is blank or `end <= start`.
    pub fn new(
        title: &str,
        description: Option<String>,
        location: Option<String>,
        start_time: DateTime<FixedOffset>,
        end_time: DateTime<FixedOffset>,
    ) -> Result<Self, RecordError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        if end_time <= start_time {
            return Err(RecordError::EndNotAfterStart {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            title: title.to_owned(),
            description,
            location,
            start_time,
            end_time,
        })
    }

    /// Event title, never empty.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Optional notes.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Optional location.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Start instant with its original offset.
    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    /// End instant with its original offset.
    pub fn end_time(&self) -> DateTime<FixedOffset> {
        self.end_time
    }

    /// Copy with a different title.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyTitle`] for a blank title.
    pub fn with_title(&self, title: &str) -> Result<Self, RecordError> {
        Self::new(
            title,
            self.description.clone(),
            self.location.clone(),
            self.start_time,
            self.end_time,
        )
    }

    /// Copy with different notes.
    pub fn with_description(&self, description: Option<String>) -> Self {
        Self {
            description,
            ..self.clone()
        }
    }

    /// Copy with a different location.
    pub fn with_location(&self, location: Option<String>) -> Self {
        Self {
            location,
            ..self.clone()
        }
    }

    /// Copy with a different time range.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EndNotAfterStart`] when `end <= start`.
    pub fn with_times(
        &self,
        start_time: DateTime<FixedOffset>,
        end_time: DateTime<FixedOffset>,
    ) -> Result<Self, RecordError> {
        Self::new(
            &self.title,
            self.description.clone(),
            self.location.clone(),
            start_time,
            end_time,
        )
    }
}
