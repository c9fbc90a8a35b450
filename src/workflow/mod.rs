mod error;
#[cfg(test)]
mod tests;

pub use error::{PersistenceFailure, SubmitError};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::draft::BookingDraft;
use crate::index::AvailabilityIndex;
use crate::model::*;
use crate::store::BookingStore;

/// Where the current submission attempt is.
///
/// `Idle → Validating → Persisting → Confirmed | Failed`, or
/// `Idle → Validating → Rejected`. Every terminal state falls back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionState {
    Idle,
    Validating,
    Persisting,
    Rejected,
    Confirmed,
    Failed,
}

impl SubmissionState {
    /// True while the submit control should stay disabled.
    pub fn is_busy(self) -> bool {
        matches!(self, SubmissionState::Validating | SubmissionState::Persisting)
    }
}

/// Publishes state changes and guarantees the attempt ends in `Idle`, even if
/// the submitting future is dropped mid-flight.
struct Attempt<'a> {
    state: &'a watch::Sender<SubmissionState>,
}

impl<'a> Attempt<'a> {
    fn begin(state: &'a watch::Sender<SubmissionState>) -> Self {
        state.send_replace(SubmissionState::Validating);
        Self { state }
    }

    fn enter(&self, next: SubmissionState) {
        self.state.send_replace(next);
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        self.state.send_replace(SubmissionState::Idle);
    }
}

/// Runs booking attempts: local availability check, store write, optimistic
/// index update.
///
/// The availability check and the write are not atomic. Two submitters that
/// look at the same free slot can both pass the check, and the store accepts
/// both writes. Only a store-side constraint could close that window.
pub struct Submitter {
    index: Arc<AvailabilityIndex>,
    store: Arc<dyn BookingStore>,
    halls: Vec<String>,
    policy: SlotPolicy,
    create_timeout: Duration,
    state: watch::Sender<SubmissionState>,
    in_flight: Mutex<()>,
}

impl Submitter {
    pub fn new(
        index: Arc<AvailabilityIndex>,
        store: Arc<dyn BookingStore>,
        halls: Vec<String>,
        policy: SlotPolicy,
    ) -> Self {
        Self {
            index,
            store,
            halls,
            policy,
            create_timeout: Duration::from_secs(10),
            state: watch::Sender::new(SubmissionState::Idle),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, create_timeout: Duration) -> Self {
        self.create_timeout = create_timeout;
        self
    }

    pub fn state(&self) -> SubmissionState {
        *self.state.borrow()
    }

    /// Follow state changes, e.g. to show a spinner while `Persisting`.
    pub fn watch(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    pub fn index(&self) -> &Arc<AvailabilityIndex> {
        &self.index
    }

    /// Run one booking attempt for `draft`.
    pub async fn submit(&self, draft: &BookingDraft) -> Result<Booking, SubmitError> {
        let result = self.run_attempt(draft).await;
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => e.label(),
        };
        metrics::counter!(crate::observability::SUBMISSIONS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn run_attempt(&self, draft: &BookingDraft) -> Result<Booking, SubmitError> {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            return Err(SubmitError::Busy);
        };
        let attempt = Attempt::begin(&self.state);

        let payload = match draft.validate(&self.halls, &self.policy) {
            Ok(payload) => payload,
            Err(e) => {
                attempt.enter(SubmissionState::Rejected);
                return Err(e.into());
            }
        };

        let requested = payload.span();
        let snapshot = self.index.snapshot().await;
        if let Some(existing) = snapshot.first_conflict(&payload.hall, payload.date, &requested) {
            warn!(
                hall = %payload.hall,
                date = %payload.date,
                "booking {requested} rejected: overlaps {} ({})",
                existing.span,
                existing.id
            );
            attempt.enter(SubmissionState::Rejected);
            return Err(SubmitError::Conflict {
                hall: payload.hall,
                date: payload.date,
                requested,
                existing: existing.span,
                with: existing.id.clone(),
            });
        }
        drop(snapshot);

        attempt.enter(SubmissionState::Persisting);
        let started = Instant::now();
        let created = tokio::time::timeout(self.create_timeout, self.store.create(payload.clone())).await;
        metrics::histogram!(crate::observability::CREATE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        let reason = match created {
            Ok(Ok(id)) => {
                let booking = payload.with_id(id);
                // Don't wait for the store's push; the slot must read as taken now.
                self.index.rebuild_with(booking.clone()).await;
                info!(
                    id = %booking.id,
                    hall = %booking.hall,
                    date = %booking.date,
                    "booking confirmed: {}",
                    booking.span()
                );
                attempt.enter(SubmissionState::Confirmed);
                return Ok(booking);
            }
            Ok(Err(e)) => PersistenceFailure::Store(e),
            Err(_) => PersistenceFailure::TimedOut(self.create_timeout),
        };

        warn!(hall = %payload.hall, date = %payload.date, "booking write failed: {reason}");
        attempt.enter(SubmissionState::Failed);
        Err(SubmitError::Persistence {
            reason,
            draft: Box::new(draft.clone()),
        })
    }
}
