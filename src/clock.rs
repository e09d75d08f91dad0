//! Reference clock and locale context for resolving relative dates.
//!
//! A [`PromptContext`] is sampled once per extraction call from a
//! [`ReferenceClock`] and never persisted.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

/// Source of "now" and the display name of the active timezone.
pub trait ReferenceClock: Send + Sync {
    /// Current instant in the clock's timezone.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Human-readable timezone name (IANA name where known).
    fn timezone_name(&self) -> String;
}

/// Wall clock, either in the host's local timezone or a configured IANA zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Option<Tz>,
}

impl SystemClock {
    /// Clock in the host's local timezone.
    pub fn local() -> Self {
        Self { timezone: None }
    }

    /// Clock pinned to an IANA timezone.
    pub fn in_timezone(timezone: Tz) -> Self {
        Self {
            timezone: Some(timezone),
        }
    }

    /// Clock pinned to a named IANA timezone such as `Europe/Berlin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA timezone.
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        let timezone: Tz = name
            .parse()
            .map_err(|e| anyhow::anyhow!("unknown timezone {name:?}: {e}"))?;
        Ok(Self::in_timezone(timezone))
    }
}

impl ReferenceClock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
            None => Local::now().fixed_offset(),
        }
    }

    fn timezone_name(&self) -> String {
        match self.timezone {
            Some(tz) => tz.name().to_owned(),
            None => std::env::var("TZ")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| format!("UTC{}", Local::now().offset())),
        }
    }
}

/// Clock frozen at a single instant. Used by tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: DateTime<FixedOffset>,
    timezone_name: String,
}

impl FixedClock {
    /// Freeze the clock at `at`, reporting `timezone_name`.
    pub fn new(at: DateTime<FixedOffset>, timezone_name: impl Into<String>) -> Self {
        Self {
            at,
            timezone_name: timezone_name.into(),
        }
    }
}

impl ReferenceClock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.at
    }

    fn timezone_name(&self) -> String {
        self.timezone_name.clone()
    }
}

/// Per-request reference date, time and timezone handed to the prompt builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// Calendar date at the moment of the request.
    pub reference_date: NaiveDate,
    /// Wall-clock time at the moment of the request.
    pub reference_time: NaiveTime,
    /// Signed `±HH:MM` UTC offset.
    pub timezone_offset: String,
    /// Timezone display name.
    pub timezone_name: String,
}

impl PromptContext {
    /// Sample the clock once.
    pub fn capture(clock: &dyn ReferenceClock) -> Self {
        Self::at(clock.now(), clock.timezone_name())
    }

    /// Build a context for a known instant.
    pub fn at(now: DateTime<FixedOffset>, timezone_name: String) -> Self {
        Self {
            reference_date: now.date_naive(),
            reference_time: now.time(),
            timezone_offset: format_offset(*now.offset()),
            timezone_name,
        }
    }
}

/// Format an offset as `±HH:MM`, dropping any seconds component.
pub fn format_offset(offset: FixedOffset) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let minutes = total.unsigned_abs() / 60;
    format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}
