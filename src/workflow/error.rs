use std::time::Duration;

use chrono::NaiveDate;

use crate::draft::{BookingDraft, DraftError};
use crate::model::{BookingId, Span};
use crate::store::StoreError;

#[derive(Debug)]
pub enum SubmitError {
    /// The form itself is incomplete or malformed. No availability check ran.
    Invalid(DraftError),
    /// The requested interval overlaps a booking already in the index.
    /// Detected locally; nothing was written.
    Conflict {
        hall: String,
        date: NaiveDate,
        requested: Span,
        existing: Span,
        with: BookingId,
    },
    /// The store did not accept the write. Safe to resubmit `draft` as is.
    Persistence {
        reason: PersistenceFailure,
        draft: Box<BookingDraft>,
    },
    /// Another submission from the same submitter is still in flight.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceFailure {
    Store(StoreError),
    TimedOut(Duration),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Persistence { .. } | SubmitError::Busy)
    }

    /// The draft handed back by a failed write.
    pub fn draft(&self) -> Option<&BookingDraft> {
        match self {
            SubmitError::Persistence { draft, .. } => Some(draft.as_ref()),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SubmitError::Invalid(_) => "invalid",
            SubmitError::Conflict { .. } => "conflict",
            SubmitError::Persistence { .. } => "failed",
            SubmitError::Busy => "busy",
        }
    }
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Invalid(e) => write!(f, "invalid booking: {e}"),
            SubmitError::Conflict {
                hall,
                date,
                requested,
                existing,
                ..
            } => write!(
                f,
                "{hall} is already booked on {date} from {existing}; the requested slot {requested} is taken"
            ),
            SubmitError::Persistence { reason, .. } => {
                write!(f, "booking could not be saved ({reason}); please try again")
            }
            SubmitError::Busy => write!(f, "a booking is already being submitted"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl std::fmt::Display for PersistenceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceFailure::Store(e) => write!(f, "{e}"),
            PersistenceFailure::TimedOut(after) => {
                write!(f, "store did not answer within {}ms", after.as_millis())
            }
        }
    }
}

impl From<DraftError> for SubmitError {
    fn from(e: DraftError) -> Self {
        SubmitError::Invalid(e)
    }
}
