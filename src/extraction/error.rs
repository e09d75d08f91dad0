//! Error taxonomy for extraction calls.
//!
//! [`ExtractionError`] is what callers see. Inside the retry loop every
//! failure is wrapped in an [`AttemptError`] whose `retryable` flag is the
//! only thing the orchestrator looks at.

use crate::providers::ProviderError;

use super::parser::ParseError;

/// Why a provider refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Missing, invalid or revoked credentials.
    Authentication,
    /// Account quota or billing limit reached.
    Quota,
    /// Too many requests in a short window.
    RateLimited,
    /// The request itself was malformed or unsupported.
    BadRequest,
    /// Any other explicit refusal.
    Other,
}

/// Terminal failure of one extraction call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// Settings or credentials are unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The event text is empty or whitespace.
    #[error("event text is empty")]
    InvalidInput,
    /// Network, HTTP-layer or timeout failure that outlived the retry budget.
    #[error("transient failure after {attempts} attempt(s): {cause}")]
    Transient {
        /// Attempts made, first attempt included.
        attempts: u32,
        /// Last underlying cause.
        cause: String,
    },
    /// The provider explicitly refused the request.
    #[error("request rejected by provider ({reason:?}): {message}")]
    Rejected {
        /// Classified cause.
        reason: RejectionReason,
        /// Provider's stated reason, sanitized.
        message: String,
    },
    /// The provider answered with a shape the client cannot interpret.
    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),
    /// Model output could not be turned into event candidates.
    #[error("could not parse model output after {attempts} attempt(s): {detail}")]
    Parse {
        /// Attempts made, first attempt included.
        attempts: u32,
        /// Parser diagnostic.
        detail: String,
    },
    /// An invariant the pipeline relies on did not hold.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExtractionError {
    /// Short, actionable message suitable for an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The language model is not configured. Add your API key in settings and try again."
            }
            Self::InvalidInput => "Please enter some text describing your event.",
            Self::Transient { .. } => {
                "Could not reach the language model. Check your connection and try again."
            }
            Self::Rejected { reason, .. } => match reason {
                RejectionReason::Authentication => {
                    "Your API key was rejected. Check your account credentials."
                }
                RejectionReason::Quota => {
                    "Your API quota is used up. Check your account plan and billing."
                }
                RejectionReason::RateLimited => "Too many requests right now. Try again shortly.",
                RejectionReason::BadRequest | RejectionReason::Other => {
                    "The language model provider rejected the request. Try rephrasing your text."
                }
            },
            Self::UnexpectedResponse(_) => {
                "The language model returned an unexpected response. Try again later."
            }
            Self::Parse { .. } => {
                "Could not understand the model's answer. Try rephrasing your text."
            }
            Self::Internal(_) => "Something went wrong while preparing your event. Please try again.",
        }
    }

    /// Stamp the final attempt count onto errors that carry one.
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            Self::Transient { cause, .. } => Self::Transient { attempts, cause },
            Self::Parse { detail, .. } => Self::Parse { attempts, detail },
            other => other,
        }
    }
}

/// Failure of a single attempt, tagged for the retry orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    /// Whether another attempt may succeed.
    pub retryable: bool,
    /// What to surface if no attempt succeeds.
    pub error: ExtractionError,
}

impl AttemptError {
    /// A failure worth retrying.
    pub fn retryable(error: ExtractionError) -> Self {
        Self {
            retryable: true,
            error,
        }
    }

    /// A failure that ends the call immediately.
    pub fn fatal(error: ExtractionError) -> Self {
        Self {
            retryable: false,
            error,
        }
    }

    /// Transient failure with the given cause.
    pub fn transient(cause: impl Into<String>) -> Self {
        Self::retryable(ExtractionError::Transient {
            attempts: 1,
            cause: cause.into(),
        })
    }

    /// Parse failure; `retryable` decides whether it consumes retry budget.
    pub fn parse(err: &ParseError, retryable: bool) -> Self {
        Self {
            retryable,
            error: ExtractionError::Parse {
                attempts: 1,
                detail: err.to_string(),
            },
        }
    }
}

impl From<ProviderError> for AttemptError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Request(e) => Self::transient(e.to_string()),
            ProviderError::Parse(detail) => {
                Self::fatal(ExtractionError::UnexpectedResponse(detail))
            }
            ProviderError::HttpStatus { status, body } => classify_status(status, body),
        }
    }
}

fn classify_status(status: u16, body: String) -> AttemptError {
    let reason = match status {
        408 | 500..=599 => {
            return AttemptError::transient(format!("HTTP {status}: {body}"));
        }
        401 | 403 => RejectionReason::Authentication,
        402 => RejectionReason::Quota,
        429 if mentions_quota(&body) => RejectionReason::Quota,
        429 => RejectionReason::RateLimited,
        400..=499 => RejectionReason::BadRequest,
        _ => RejectionReason::Other,
    };
    AttemptError::fatal(ExtractionError::Rejected {
        reason,
        message: body,
    })
}

fn mentions_quota(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("insufficient_quota") || lower.contains("quota") || lower.contains("billing")
}
