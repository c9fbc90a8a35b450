//! The boundary to the shared booking store. The engine only ever talks to a
//! [`BookingStore`]; the two implementations here exist so the binary and the
//! tests have something to run against.

mod journal;
mod memory;

pub use journal::{Journal, JournalEntry, JournalStore, Replay};
pub use memory::MemoryStore;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::model::*;
use crate::notify::BookingSet;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist a new document and return the id the store assigned to it.
    async fn create(&self, booking: NewBooking) -> Result<BookingId, StoreError>;

    /// One-shot read of the whole collection.
    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError>;

    /// Stream of full collections, one per change. Only guarantees that every
    /// successful `create` is eventually reflected.
    fn subscribe(&self) -> broadcast::Receiver<BookingSet>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Io(String),
    Rejected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Rejected(reason) => write!(f, "store rejected write: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
