//! iCalendar (RFC 5545) export of validated records.
//!
//! Only [`EventRecord`]s reach this module, so every rendered `VEVENT` has a
//! title and an end strictly after its start.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::types::EventRecord;

/// `PRODID` written into every calendar.
pub const PRODID: &str = "-//textcal//Event Extraction//EN";

/// Maximum line length in octets, excluding the CRLF.
const MAX_LINE_OCTETS: usize = 75;

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Failure to persist a calendar.
#[derive(Debug, thiserror::Error)]
pub enum IcsError {
    /// The file could not be written.
    #[error("failed to write calendar file {}: {source}", path.display())]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Render records as one `VCALENDAR`, with `stamp` as every event's `DTSTAMP`.
pub fn render_calendar(records: &[EventRecord], stamp: DateTime<Utc>) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:{PRODID}"));
    push_line(&mut out, "CALSCALE:GREGORIAN");
    for record in records {
        render_event(&mut out, record, stamp);
    }
    push_line(&mut out, "END:VCALENDAR");
    out
}

fn render_event(out: &mut String, record: &EventRecord, stamp: DateTime<Utc>) {
    push_line(out, "BEGIN:VEVENT");
    push_line(out, &format!("UID:{}@textcal", uuid::Uuid::new_v4()));
    push_line(out, &format!("DTSTAMP:{}", stamp.format(UTC_FORMAT)));
    push_line(
        out,
        &format!("DTSTART:{}", utc_stamp(record.start_time().with_timezone(&Utc))),
    );
    push_line(
        out,
        &format!("DTEND:{}", utc_stamp(record.end_time().with_timezone(&Utc))),
    );
    push_line(out, &format!("SUMMARY:{}", escape_text(record.title())));
    if let Some(description) = record.description() {
        push_line(out, &format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(location) = record.location() {
        push_line(out, &format!("LOCATION:{}", escape_text(location)));
    }
    push_line(out, "END:VEVENT");
}

fn utc_stamp(at: DateTime<Utc>) -> String {
    at.format(UTC_FORMAT).to_string()
}

/// Escape a TEXT value: backslash, semicolon, comma and newlines.
pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            ';' => escaped.push_str("\\;"),
            ',' => escaped.push_str("\\,"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                escaped.push_str("\\n");
            }
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Append `line` folded at 75 octets, each physical line ending in CRLF.
///
/// Continuation lines start with a single space, which counts toward their
/// length. Folds never split a UTF-8 sequence.
fn push_line(out: &mut String, line: &str) {
    let mut width = 0usize;
    for c in line.chars() {
        let len = c.len_utf8();
        if width.saturating_add(len) > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width = width.saturating_add(len);
    }
    out.push_str("\r\n");
}

/// Render `records` and write them to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`IcsError::Io`] if the file cannot be written.
pub fn write_calendar_file(path: &Path, records: &[EventRecord]) -> Result<(), IcsError> {
    let rendered = render_calendar(records, Utc::now());
    std::fs::write(path, rendered).map_err(|source| IcsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), events = records.len(), "wrote calendar file");
    Ok(())
}
