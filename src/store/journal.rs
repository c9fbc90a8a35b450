use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::MAX_JOURNAL_RECORD_LEN;
use crate::model::*;
use crate::notify::{BookingSet, ChangeHub};

use super::{BookingStore, StoreError};

/// Journal record format. Bookings are only ever added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry {
    BookingCreated(Booking),
}

/// Encode a single entry to [len][bincode][crc32] format.
fn encode_entry(entry: &JournalEntry) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(entry).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_JOURNAL_RECORD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "journal record too large"));
    }
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(frame)
}

/// Entries read back from disk, plus the byte length of the valid prefix.
#[derive(Debug, Default)]
pub struct Replay {
    pub entries: Vec<JournalEntry>,
    pub valid_len: u64,
}

/// Append-only booking journal.
///
/// Format per entry: `[u32: len][bincode: JournalEntry][u32: crc32]`.
/// A truncated or corrupt tail (crash mid-write) is cut off by [`Journal::recover`]
/// before anything new is appended, so later entries never land behind garbage.
pub struct Journal {
    file: File,
    path: PathBuf,
    /// End of the last fully written entry.
    len: u64,
}

impl Journal {
    /// Open for appending. The file must hold only valid entries; use
    /// [`Journal::recover`] for anything that may have a torn tail.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
        })
    }

    /// Replay the journal, cut off any invalid tail, and open it for appending.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<JournalEntry>)> {
        let replay = Self::replay(path)?;
        let mut journal = Self::open(path)?;
        if journal.len > replay.valid_len {
            warn!(
                "journal {}: discarding {} bytes of torn tail",
                path.display(),
                journal.len - replay.valid_len
            );
            journal.file.set_len(replay.valid_len)?;
            journal.file.sync_all()?;
            journal.len = replay.valid_len;
        }
        Ok((journal, replay.entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and fsync before returning. On failure the file is cut
    /// back to its previous length, so a half-written frame never stays behind.
    pub fn append(&mut self, entry: &JournalEntry) -> io::Result<()> {
        let frame = encode_entry(entry)?;
        let written = self.file.write_all(&frame).and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(self.len) {
                warn!("journal {}: rollback after failed append failed: {rollback}", self.path.display());
            }
            return Err(e);
        }
        self.len += frame.len() as u64;
        Ok(())
    }

    /// Read every valid entry from disk. Stops at the first truncated, oversized
    /// or corrupt frame.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_JOURNAL_RECORD_LEN {
                break;
            }

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break;
            }

            match bincode::deserialize::<JournalEntry>(&payload) {
                Ok(entry) => replay.entries.push(entry),
                Err(_) => break,
            }
            replay.valid_len += (len + 8) as u64;
        }

        Ok(replay)
    }
}

struct JournalState {
    journal: Journal,
    docs: Vec<Booking>,
}

/// Booking store persisted to a local [`Journal`]. Same semantics as
/// [`super::MemoryStore`]: ids are ULIDs and no overlap constraint is applied.
pub struct JournalStore {
    state: Mutex<JournalState>,
    hub: ChangeHub,
}

impl JournalStore {
    pub fn open(path: &Path) -> io::Result<Self> {
        let (journal, entries) = Journal::recover(path)?;
        let docs: Vec<Booking> = entries
            .into_iter()
            .map(|JournalEntry::BookingCreated(b)| b)
            .collect();
        info!("journal {} replayed: {} bookings", path.display(), docs.len());
        Ok(Self {
            state: Mutex::new(JournalState { journal, docs }),
            hub: ChangeHub::new(),
        })
    }
}

#[async_trait]
impl BookingStore for JournalStore {
    async fn create(&self, booking: NewBooking) -> Result<BookingId, StoreError> {
        let id = BookingId::new(Ulid::new().to_string());
        let booking = booking.with_id(id.clone());

        let mut state = self.state.lock().await;
        state.journal.append(&JournalEntry::BookingCreated(booking.clone()))?;
        state.docs.push(booking);
        self.hub.publish(Arc::new(state.docs.clone()));
        Ok(id)
    }

    async fn fetch_all(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self.state.lock().await.docs.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<BookingSet> {
        self.hub.subscribe()
    }
}
