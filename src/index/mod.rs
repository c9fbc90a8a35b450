mod availability;

pub use availability::{Slot, merge_overlapping, subtract_intervals};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::model::*;

/// One occupied interval, tagged with the booking that occupies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupied {
    pub id: BookingId,
    pub span: Span,
}

/// Immutable view of every known booking, grouped hall → date → intervals
/// sorted by start. Built in one go by [`IndexSnapshot::build`] and never
/// touched afterwards.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    bookings: Vec<Booking>,
    days: HashMap<String, HashMap<NaiveDate, Vec<Occupied>>>,
}

impl IndexSnapshot {
    /// Derive the index from a full booking collection. Records sharing an id
    /// collapse to the last one seen; malformed records are skipped.
    pub fn build(bookings: impl IntoIterator<Item = Booking>) -> Self {
        let mut position: HashMap<BookingId, usize> = HashMap::new();
        let mut unique: Vec<Booking> = Vec::new();
        for booking in bookings {
            if !booking.is_well_formed() {
                warn!(id = %booking.id, "skipping booking with start >= end");
                continue;
            }
            match position.get(&booking.id) {
                Some(&pos) => unique[pos] = booking,
                None => {
                    position.insert(booking.id.clone(), unique.len());
                    unique.push(booking);
                }
            }
        }

        let mut days: HashMap<String, HashMap<NaiveDate, Vec<Occupied>>> = HashMap::new();
        for b in &unique {
            days.entry(b.hall.clone())
                .or_default()
                .entry(b.date)
                .or_default()
                .push(Occupied {
                    id: b.id.clone(),
                    span: b.span(),
                });
        }
        for per_date in days.values_mut() {
            for intervals in per_date.values_mut() {
                intervals.sort_by(|a, b| a.span.start.cmp(&b.span.start).then_with(|| a.id.cmp(&b.id)));
            }
        }

        Self { bookings: unique, days }
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    /// Every booking the index was built from, deduplicated.
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn contains(&self, id: &BookingId) -> bool {
        self.bookings.iter().any(|b| &b.id == id)
    }

    /// Occupied intervals on a hall/date, ascending by start. Not coalesced.
    pub fn occupied(&self, hall: &str, date: NaiveDate) -> &[Occupied] {
        self.days
            .get(hall)
            .and_then(|per_date| per_date.get(&date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn occupied_intervals(&self, hall: &str, date: NaiveDate) -> Vec<Span> {
        self.occupied(hall, date).iter().map(|o| o.span).collect()
    }

    /// Bookings on a hall/date whose interval overlaps `query`.
    /// Uses binary search to skip intervals starting at or after `query.end`.
    pub fn overlapping<'a>(&'a self, hall: &str, date: NaiveDate, query: &Span) -> impl Iterator<Item = &'a Occupied> {
        let occupied = self.occupied(hall, date);
        let right_bound = occupied.partition_point(|o| o.span.start < query.end);
        let query_start = query.start;
        occupied[..right_bound].iter().filter(move |o| o.span.end > query_start)
    }

    pub fn is_available(&self, hall: &str, date: NaiveDate, span: &Span) -> bool {
        self.overlapping(hall, date, span).next().is_none()
    }

    /// First booking blocking `span`, if any.
    pub fn first_conflict(&self, hall: &str, date: NaiveDate, span: &Span) -> Option<&Occupied> {
        self.overlapping(hall, date, span).next()
    }

    /// All bookings, optionally restricted to one date, ordered by date, start, hall.
    pub fn listing(&self, date: Option<NaiveDate>) -> Vec<&Booking> {
        let mut out: Vec<&Booking> = self
            .bookings
            .iter()
            .filter(|b| date.is_none_or(|d| b.date == d))
            .collect();
        out.sort_by(|a, b| {
            (a.date, a.start_time, &a.hall, &a.id).cmp(&(b.date, b.start_time, &b.hall, &b.id))
        });
        out
    }
}

/// Shared, swap-on-rebuild availability index.
///
/// Readers take an `Arc` to the current snapshot and keep a consistent view
/// for as long as they hold it. Writers build a complete new snapshot and
/// replace the pointer; nobody ever observes a half-built index.
pub struct AvailabilityIndex {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl Default for AvailabilityIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityIndex {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(IndexSnapshot::default())),
        }
    }

    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().await.clone()
    }

    /// Replace the whole index from a full booking collection. Last call wins.
    pub async fn rebuild(&self, bookings: Vec<Booking>) {
        let next = Arc::new(IndexSnapshot::build(bookings));
        let count = next.len();
        *self.current.write().await = next;
        record_rebuild(count);
    }

    /// Rebuild from the current collection plus `extra`, holding the write
    /// lock across read and swap so a concurrent push is never lost.
    pub async fn rebuild_with(&self, extra: Booking) {
        let mut guard = self.current.write().await;
        let bookings = guard.bookings.iter().cloned().chain(std::iter::once(extra));
        let next = Arc::new(IndexSnapshot::build(bookings));
        let count = next.len();
        *guard = next;
        drop(guard);
        record_rebuild(count);
    }

    pub async fn is_available(&self, hall: &str, date: NaiveDate, span: &Span) -> bool {
        self.snapshot().await.is_available(hall, date, span)
    }

    pub async fn occupied_intervals(&self, hall: &str, date: NaiveDate) -> Vec<Span> {
        self.snapshot().await.occupied_intervals(hall, date)
    }
}

fn record_rebuild(count: usize) {
    debug!(bookings = count, "availability index rebuilt");
    metrics::counter!(crate::observability::INDEX_REBUILDS_TOTAL).increment(1);
    metrics::gauge!(crate::observability::INDEX_BOOKINGS).set(count as f64);
}
