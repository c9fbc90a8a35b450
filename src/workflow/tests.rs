use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::*;
use crate::draft::{DraftField, DraftError};
use crate::model::fixtures::*;
use crate::notify::{BookingSet, ChangeHub};
use crate::store::StoreError;

enum Reply {
    Id(&'static str),
    Fail(StoreError),
    After(Duration, &'static str),
    Hang,
}

/// Store stub that records every `create` and answers from a script.
/// It never pushes on its subscription channel.
#[derive(Default)]
struct RecordingStore {
    calls: StdMutex<Vec<NewBooking>>,
    replies: StdMutex<VecDeque<Reply>>,
    hub: ChangeHub,
}

impl RecordingStore {
    fn scripted(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(replies.into()),
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<NewBooking> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookingStore for RecordingStore {
    async fn create(&self, booking: NewBooking) -> Result<BookingId, StoreError> {
        self.calls.lock().unwrap().push(booking);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Id(id)) => Ok(BookingId::new(id)),
            Some(Reply::Fail(e)) => Err(e),
            Some(Reply::After(delay, id)) => {
                tokio::time::sleep(delay).await;
                Ok(BookingId::new(id))
            }
            Some(Reply::Hang) => futures::future::pending().await,
            None => Ok(BookingId::new(format!("auto-{}", self.calls.lock().unwrap().len()))),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(Vec::new())
    }

    fn subscribe(&self) -> broadcast::Receiver<BookingSet> {
        self.hub.subscribe()
    }
}

fn halls() -> Vec<String> {
    vec!["Hall A".into(), "Hall B".into()]
}

fn submitter(index: Arc<AvailabilityIndex>, store: Arc<RecordingStore>) -> Submitter {
    Submitter::new(index, store, halls(), SlotPolicy::default())
}

fn draft(hall: &str, date: &str, start: &str, end: &str) -> BookingDraft {
    let mut draft = BookingDraft::for_slot(hall, d(date), Span::new(t(start), t(end)));
    draft.set(DraftField::BookerName, "Asha").unwrap();
    draft.set(DraftField::BookerPhone, "555-0100").unwrap();
    draft.set(DraftField::EventName, "Seminar").unwrap();
    draft
}

fn span(start: &str, end: &str) -> Span {
    Span::new(t(start), t(end))
}

#[tokio::test]
async fn conflicting_submission_never_calls_create() {
    let index = Arc::new(AvailabilityIndex::new());
    index
        .rebuild(vec![booking("a", "Hall A", "2024-05-01", "09:00", "10:00")])
        .await;
    let store = RecordingStore::scripted(vec![]);
    let submitter = submitter(index, store.clone());

    let err = submitter
        .submit(&draft("Hall A", "2024-05-01", "09:30", "10:30"))
        .await
        .unwrap_err();

    match &err {
        SubmitError::Conflict { hall, existing, with, .. } => {
            assert_eq!(hall, "Hall A");
            assert_eq!(*existing, span("09:00", "10:00"));
            assert_eq!(with, &BookingId::new("a"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("Hall A"));
    assert!(message.contains("taken"));
    assert!(!err.is_retryable());
    assert!(store.calls().is_empty());
    assert_eq!(submitter.state(), SubmissionState::Idle);
}

#[tokio::test]
async fn confirmed_booking_blocks_slot_without_a_push() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![Reply::Id("X1")]);
    let submitter = submitter(index.clone(), store.clone());

    let booking = submitter
        .submit(&draft("Hall A", "2024-05-01", "09:00", "10:00"))
        .await
        .unwrap();

    assert_eq!(booking.id, BookingId::new("X1"));
    assert_eq!(store.calls().len(), 1);
    assert!(!index.is_available("Hall A", d("2024-05-01"), &span("09:00", "10:00")).await);
    assert!(index.snapshot().await.contains(&BookingId::new("X1")));
    assert_eq!(submitter.state(), SubmissionState::Idle);
}

#[tokio::test]
async fn echoed_record_is_not_duplicated() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![Reply::Id("X1")]);
    let submitter = submitter(index.clone(), store);

    let booking = submitter
        .submit(&draft("Hall A", "2024-05-01", "09:00", "10:00"))
        .await
        .unwrap();
    // The store later pushes the same record back.
    index.rebuild(vec![booking]).await;

    assert_eq!(index.occupied_intervals("Hall A", d("2024-05-01")).await.len(), 1);
}

#[tokio::test]
async fn store_failure_preserves_draft_and_allows_retry() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![
        Reply::Fail(StoreError::Io("connection reset".into())),
        Reply::Id("X2"),
    ]);
    let submitter = submitter(index.clone(), store.clone());
    let original = draft("Hall B", "2024-05-01", "13:00", "14:00");

    let err = submitter.submit(&original).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        &err,
        SubmitError::Persistence { reason: PersistenceFailure::Store(StoreError::Io(_)), .. }
    ));
    assert_eq!(err.draft(), Some(&original));
    assert!(index.is_available("Hall B", d("2024-05-01"), &span("13:00", "14:00")).await);
    assert_eq!(submitter.state(), SubmissionState::Idle);

    let retry = err.draft().unwrap().clone();
    let booking = submitter.submit(&retry).await.unwrap();
    assert_eq!(booking.id, BookingId::new("X2"));
    assert_eq!(store.calls().len(), 2);
}

#[tokio::test]
async fn hung_store_times_out() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![Reply::Hang]);
    let submitter = submitter(index.clone(), store).with_timeout(Duration::from_millis(30));

    let err = submitter
        .submit(&draft("Hall A", "2024-05-01", "09:00", "10:00"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubmitError::Persistence { reason: PersistenceFailure::TimedOut(_), .. }
    ));
    assert!(index.snapshot().await.is_empty());
    assert_eq!(submitter.state(), SubmissionState::Idle);
}

#[tokio::test]
async fn invalid_draft_is_rejected_before_any_check() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![]);
    let submitter = submitter(index, store.clone());

    let mut bad = draft("Hall A", "2024-05-01", "10:00", "11:00");
    bad.set(DraftField::EndTime, "10:00").unwrap();
    let err = submitter.submit(&bad).await.unwrap_err();
    assert!(matches!(err, SubmitError::Invalid(DraftError::EmptyInterval { .. })));

    let err = submitter
        .submit(&draft("Ballroom", "2024-05-01", "10:00", "11:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Invalid(DraftError::UnknownHall(_))));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn second_submission_while_persisting_is_busy() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![Reply::After(Duration::from_millis(30), "X1")]);
    let submitter = submitter(index, store.clone());

    let first = draft("Hall A", "2024-05-01", "09:00", "10:00");
    let second = draft("Hall B", "2024-05-01", "09:00", "10:00");
    let (a, b) = tokio::join!(submitter.submit(&first), submitter.submit(&second));

    assert!(a.is_ok());
    assert!(matches!(b, Err(SubmitError::Busy)));
    assert_eq!(store.calls().len(), 1);
}

#[tokio::test]
async fn state_is_observable_while_persisting() {
    let index = Arc::new(AvailabilityIndex::new());
    let store = RecordingStore::scripted(vec![Reply::After(Duration::from_millis(30), "X1")]);
    let submitter = submitter(index, store);
    let mut rx = submitter.watch();

    let request = draft("Hall A", "2024-05-01", "09:00", "10:00");
    let (result, saw_persisting) = tokio::join!(submitter.submit(&request), async {
        rx.wait_for(|s| *s == SubmissionState::Persisting).await.is_ok()
    });

    assert!(result.is_ok());
    assert!(saw_persisting);
    assert!(SubmissionState::Persisting.is_busy());
    assert_eq!(submitter.state(), SubmissionState::Idle);
}

#[tokio::test]
async fn touching_booking_is_accepted() {
    let index = Arc::new(AvailabilityIndex::new());
    index
        .rebuild(vec![booking("a", "Hall A", "2024-05-01", "09:00", "10:00")])
        .await;
    let store = RecordingStore::scripted(vec![Reply::Id("X1")]);
    let submitter = submitter(index, store.clone());

    assert!(submitter.submit(&draft("Hall A", "2024-05-01", "10:00", "11:00")).await.is_ok());
    assert_eq!(store.calls().len(), 1);
}
