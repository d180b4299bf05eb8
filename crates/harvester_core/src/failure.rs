use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::PageNumber;

/// Closed set of failure categories a page source may report.
///
/// The retry layer switches on this instead of inspecting concrete error
/// types, so every source must map its errors into one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    HttpStatus(u16),
    RateLimited { reset_at: Option<DateTime<Utc>> },
    Decode,
    Cancelled,
}

impl FailureKind {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FailureKind::RateLimited { .. })
    }

    /// Client errors that will not change on retry (404, 401, 422, ...).
    /// Request timeouts (408) and rate limiting (429) are excluded.
    pub fn is_permanent(&self) -> bool {
        match self {
            FailureKind::HttpStatus(code) => (400..500).contains(code) && *code != 408 && *code != 429,
            _ => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::RateLimited { reset_at: Some(reset) } => {
                write!(f, "rate limited until {}", reset.to_rfc3339())
            }
            FailureKind::RateLimited { reset_at: None } => write!(f, "rate limited"),
            FailureKind::Decode => write!(f, "malformed response body"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "harvest cancelled")
    }
}

/// Terminal failure of one page after the retry wrapper gave up on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("all retry attempts failed for page {page}: {source}")]
    Exhausted {
        page: PageNumber,
        attempts: u32,
        source: FetchError,
    },
    #[error("page {page} failed permanently: {source}")]
    Permanent {
        page: PageNumber,
        attempts: u32,
        source: FetchError,
    },
    #[error("page {page} cancelled after {attempts} attempts")]
    Cancelled { page: PageNumber, attempts: u32 },
}

impl PageError {
    pub fn page(&self) -> PageNumber {
        match self {
            PageError::Exhausted { page, .. }
            | PageError::Permanent { page, .. }
            | PageError::Cancelled { page, .. } => *page,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PageError::Exhausted { attempts, .. }
            | PageError::Permanent { attempts, .. }
            | PageError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PageError::Exhausted { source, .. } | PageError::Permanent { source, .. } => {
                source.kind.clone()
            }
            PageError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}
