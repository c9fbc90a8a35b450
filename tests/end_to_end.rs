use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use hallbook::draft::{BookingDraft, DraftField};
use hallbook::index::AvailabilityIndex;
use hallbook::model::{SlotPolicy, Span, TimeOfDay, parse_date};
use hallbook::store::{BookingStore, JournalStore, MemoryStore, StoreError};
use hallbook::sync::spawn_sync;
use hallbook::workflow::{PersistenceFailure, SubmitError, Submitter};

// ── Test infrastructure ──────────────────────────────────────

fn halls() -> Vec<String> {
    vec!["Hall A".into(), "Hall B".into(), "Hall C".into()]
}

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn span(start: &str, end: &str) -> Span {
    Span::new(t(start), t(end))
}

fn draft(hall: &str, day: &str, start: &str, end: &str, who: &str) -> BookingDraft {
    let mut draft = BookingDraft::for_slot(hall, date(day), span(start, end));
    draft.set(DraftField::BookerName, who).unwrap();
    draft.set(DraftField::BookerPhone, "555-0100").unwrap();
    draft.set(DraftField::EventName, "Department meeting").unwrap();
    draft.set(DraftField::Designation, "Professor").unwrap();
    draft.set(DraftField::Department, "Chemistry").unwrap();
    draft
}

/// One client: its own index kept in sync with the shared store.
struct Client {
    index: Arc<AvailabilityIndex>,
    submitter: Submitter,
    sync: tokio::task::JoinHandle<()>,
}

impl Client {
    fn connect(store: Arc<dyn BookingStore>) -> Self {
        let index = Arc::new(AvailabilityIndex::new());
        let sync = spawn_sync(index.clone(), store.clone());
        let submitter = Submitter::new(index.clone(), store, halls(), SlotPolicy::default());
        Self { index, submitter, sync }
    }

    async fn wait_for_bookings(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.index.snapshot().await.len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("sync push never arrived");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.sync.abort();
    }
}

// ── Scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn booking_day_scenario() {
    let store: Arc<dyn BookingStore> = Arc::new(MemoryStore::new());
    let client = Client::connect(store.clone());
    let day = "2024-05-01";

    let first = client.submitter.submit(&draft("Hall A", day, "09:00", "10:00", "Asha")).await;
    assert!(first.is_ok());

    let clash = client.submitter.submit(&draft("Hall A", day, "09:30", "10:30", "Ravi")).await;
    assert!(matches!(clash, Err(SubmitError::Conflict { .. })));

    let touching = client.submitter.submit(&draft("Hall A", day, "10:00", "11:00", "Meera")).await;
    assert!(touching.is_ok());

    let other_hall = client.submitter.submit(&draft("Hall B", day, "09:00", "10:00", "Ravi")).await;
    assert!(other_hall.is_ok());

    assert_eq!(store.fetch_all().await.unwrap().len(), 3);
    let snapshot = client.index.snapshot().await;
    assert_eq!(
        snapshot.occupied_intervals("Hall A", date(day)),
        vec![span("09:00", "10:00"), span("10:00", "11:00")]
    );
    let booked: Vec<_> = snapshot
        .slots("Hall A", date(day), &SlotPolicy::default())
        .into_iter()
        .filter(|s| s.booked)
        .map(|s| s.span)
        .collect();
    assert_eq!(booked, vec![span("09:00", "10:00"), span("10:00", "11:00")]);
}

#[tokio::test]
async fn other_clients_see_pushed_bookings() {
    let store: Arc<dyn BookingStore> = Arc::new(MemoryStore::new());
    let alice = Client::connect(store.clone());
    let bob = Client::connect(store.clone());

    alice
        .submitter
        .submit(&draft("Hall C", "2024-05-01", "14:00", "16:00", "Alice"))
        .await
        .unwrap();
    bob.wait_for_bookings(1).await;

    let err = bob
        .submitter
        .submit(&draft("Hall C", "2024-05-01", "15:00", "16:00", "Bob"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Hall C"));
    assert_eq!(store.fetch_all().await.unwrap().len(), 1);
}

/// Check-then-write is not atomic: two clients that both saw the slot free
/// before either write landed both succeed, and the store ends up holding an
/// overlapping pair. Nothing in the engine prevents this.
#[tokio::test]
async fn concurrent_clients_can_double_book() {
    let memory = Arc::new(MemoryStore::new());
    memory.delay_creates(Some(Duration::from_millis(50))).await;
    let store: Arc<dyn BookingStore> = memory.clone();
    let alice = Client::connect(store.clone());
    let bob = Client::connect(store.clone());

    let a = draft("Hall A", "2024-05-01", "09:00", "10:00", "Alice");
    let b = draft("Hall A", "2024-05-01", "09:30", "10:30", "Bob");
    let (ra, rb) = tokio::join!(alice.submitter.submit(&a), bob.submitter.submit(&b));

    assert!(ra.is_ok());
    assert!(rb.is_ok());
    let stored = store.fetch_all().await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].span().overlaps(&stored[1].span()));

    // Once synced, both indexes show both intervals rather than hiding one.
    alice.wait_for_bookings(2).await;
    bob.wait_for_bookings(2).await;
    assert_eq!(alice.index.occupied_intervals("Hall A", date("2024-05-01")).await.len(), 2);
    assert_eq!(bob.index.occupied_intervals("Hall A", date("2024-05-01")).await.len(), 2);
}

#[tokio::test]
async fn failed_write_can_be_resubmitted() {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn BookingStore> = memory.clone();
    let client = Client::connect(store.clone());

    memory.reject_creates(Some("quota exceeded".into())).await;
    let err = client
        .submitter
        .submit(&draft("Hall B", "2024-05-02", "11:00", "12:00", "Asha"))
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        SubmitError::Persistence { reason: PersistenceFailure::Store(StoreError::Rejected(_)), .. }
    ));
    assert!(client.index.is_available("Hall B", date("2024-05-02"), &span("11:00", "12:00")).await);

    memory.reject_creates(None).await;
    let retry = err.draft().cloned().unwrap();
    let booking = client.submitter.submit(&retry).await.unwrap();
    assert_eq!(booking.hall, "Hall B");
    assert!(!client.index.is_available("Hall B", date("2024-05-02"), &span("11:00", "12:00")).await);
}

#[tokio::test]
async fn journal_store_restores_index_on_restart() {
    let dir = std::env::temp_dir().join(format!("hallbook_e2e_{}", ulid::Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bookings.journal");

    {
        let store: Arc<dyn BookingStore> = Arc::new(JournalStore::open(&path).unwrap());
        let client = Client::connect(store);
        client
            .submitter
            .submit(&draft("Hall A", "2024-05-01", "09:00", "10:00", "Asha"))
            .await
            .unwrap();
    }

    let store: Arc<dyn BookingStore> = Arc::new(JournalStore::open(&path).unwrap());
    let client = Client::connect(store);
    client.wait_for_bookings(1).await;
    let err = client
        .submitter
        .submit(&draft("Hall A", "2024-05-01", "09:00", "09:30", "Ravi"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Conflict { .. }));

    let _ = std::fs::remove_dir_all(&dir);
}
