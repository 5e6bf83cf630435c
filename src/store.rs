use std::io;
use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use crate::model::AvailabilityInterval;

#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Io(io::Error),
    Decode(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Io(e) => write!(f, "store I/O error: {e}"),
            StoreError::Decode(e) => write!(f, "store decode error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e)
    }
}

/// Where a room's availability rows come from. The engine never calls this;
/// the request layer fetches first and hands the rows over.
#[async_trait]
pub trait Store: Send + Sync {
    /// All rows for the room. An unknown room is an empty list, not an error.
    async fn fetch_intervals(&self, room_id: &str) -> Result<Vec<AvailabilityInterval>, StoreError>;
}

/// Rows grouped by room id.
pub struct InMemoryStore {
    rooms: DashMap<String, Vec<AvailabilityInterval>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn from_rows(rows: impl IntoIterator<Item = AvailabilityInterval>) -> Self {
        let store = Self::new();
        for row in rows {
            store.insert(row);
        }
        store
    }

    /// Load a JSON array of `availability_blocks` rows. Columns other than
    /// `room_id, participant_id, start_at, end_at` are ignored.
    pub fn load_seed(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path)?;
        let rows: Vec<AvailabilityInterval> = serde_json::from_slice(&bytes)?;
        let count = rows.len();
        let store = Self::from_rows(rows);
        info!(
            "loaded {count} intervals across {} rooms from {}",
            store.room_count(),
            path.display()
        );
        Ok(store)
    }

    pub fn insert(&self, row: AvailabilityInterval) {
        self.rooms.entry(row.room_id.clone()).or_default().push(row);
    }

    /// Swap a room's rows wholesale.
    pub fn replace_room(&self, room_id: &str, rows: Vec<AvailabilityInterval>) {
        if rows.is_empty() {
            self.rooms.remove(room_id);
        } else {
            self.rooms.insert(room_id.to_string(), rows);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn interval_count(&self) -> usize {
        self.rooms.iter().map(|e| e.value().len()).sum()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn fetch_intervals(&self, room_id: &str) -> Result<Vec<AvailabilityInterval>, StoreError> {
        Ok(self
            .rooms
            .get(room_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }
}
