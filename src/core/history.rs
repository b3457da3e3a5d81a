//! Translation history
//!
//! Bounded, newest-first record of successful translations. The whole
//! collection is persisted under one well-known key and rewritten on every
//! mutation; a mutation only becomes visible after the write has committed.

use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, LockResult, Mutex, MutexGuard};

use crate::shared::error::{AppError, AppResult};
use crate::shared::types::TranslationEntry;

/// Key: collection name, Value: JSON array of entries, newest first
const HISTORY_TABLE: TableDefinition<&str, &str> = TableDefinition::new("translation_history");
const HISTORY_KEY: &str = "history";

/// Durable storage for the serialized history collection
pub trait HistoryStorage: Send + Sync {
    fn load(&self) -> AppResult<Vec<TranslationEntry>>;

    /// Replace the persisted collection. Either the whole collection is
    /// written or nothing is.
    fn commit(&self, entries: &[TranslationEntry]) -> AppResult<()>;
}

/// Redb-based storage implementation
pub struct RedbHistoryStorage {
    db: Database,
}

impl RedbHistoryStorage {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Io(format!("Failed to create data directory: {}", e)))?;
        }

        let db = Database::create(path)
            .map_err(|e| AppError::Storage(format!("Failed to create database: {}", e)))?;

        // Initialize table
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| AppError::Storage(format!("Failed to begin write transaction: {}", e)))?;
            {
                let _table = write_txn
                    .open_table(HISTORY_TABLE)
                    .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;
            }
            write_txn
                .commit()
                .map_err(|e| AppError::Storage(format!("Failed to commit transaction: {}", e)))?;
        }

        Ok(Self { db })
    }
}

impl HistoryStorage for RedbHistoryStorage {
    fn load(&self) -> AppResult<Vec<TranslationEntry>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| AppError::Storage(format!("Failed to begin read: {}", e)))?;

        let table = read_txn
            .open_table(HISTORY_TABLE)
            .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;

        let value = table
            .get(HISTORY_KEY)
            .map_err(|e| AppError::Storage(format!("Failed to read history: {}", e)))?;

        let Some(raw) = value else {
            return Ok(Vec::new());
        };
        let entries: Vec<TranslationEntry> = serde_json::from_str(raw.value())
            .map_err(|e| AppError::Storage(format!("Corrupt history record: {}", e)))?;
        Ok(entries)
    }

    fn commit(&self, entries: &[TranslationEntry]) -> AppResult<()> {
        let serialized = serde_json::to_string(entries)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| AppError::Storage(format!("Failed to begin write: {}", e)))?;
        {
            let mut table = write_txn
                .open_table(HISTORY_TABLE)
                .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;

            table
                .insert(HISTORY_KEY, serialized.as_str())
                .map_err(|e| AppError::Storage(format!("Failed to insert: {}", e)))?;
        }
        // Dropping an uncommitted transaction aborts it
        write_txn
            .commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit: {}", e)))?;

        Ok(())
    }
}

/// In-memory storage, used in tests and as a fallback when the database
/// cannot be opened.
#[derive(Default)]
pub struct InMemoryHistoryStorage {
    items: Mutex<Vec<TranslationEntry>>,
}

impl InMemoryHistoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<TranslationEntry>) -> Self {
        Self {
            items: Mutex::new(entries),
        }
    }
}

impl HistoryStorage for InMemoryHistoryStorage {
    fn load(&self) -> AppResult<Vec<TranslationEntry>> {
        let items = self
            .items
            .lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        Ok(items.clone())
    }

    fn commit(&self, entries: &[TranslationEntry]) -> AppResult<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| AppError::Storage(format!("Mutex poisoned: {}", e)))?;
        *items = entries.to_vec();
        Ok(())
    }
}

/// History store: sole owner and writer of the history collection.
///
/// Mutations are serialized through a writer lock held across the durable
/// commit, so exactly one of any two racing mutations is observed as the
/// later one. Readers only take the entries lock, which is never held during
/// a commit.
pub struct HistoryStore {
    storage: Arc<dyn HistoryStorage>,
    writer: Mutex<()>,
    entries: Mutex<Vec<TranslationEntry>>,
    capacity: usize,
}

impl HistoryStore {
    /// Load the persisted collection. A corrupt record is a fatal storage error.
    pub fn open(storage: Arc<dyn HistoryStorage>, capacity: usize) -> AppResult<Self> {
        if capacity == 0 {
            return Err(AppError::Validation("History capacity must be at least 1".to_string()));
        }

        let mut entries = storage.load()?;
        let loaded = entries.len();

        let mut seen = HashSet::new();
        entries.retain(|entry| seen.insert(entry.id.clone()));
        entries.truncate(capacity);

        tracing::info!(loaded, kept = entries.len(), capacity, "history loaded");

        Ok(Self {
            storage,
            writer: Mutex::new(()),
            entries: Mutex::new(entries),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn recover<'a, T>(result: LockResult<MutexGuard<'a, T>>, name: &str) -> MutexGuard<'a, T> {
        match result {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(lock = name, "history mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        Self::recover(self.writer.lock(), "writer")
    }

    fn lock_entries(&self) -> MutexGuard<'_, Vec<TranslationEntry>> {
        Self::recover(self.entries.lock(), "entries")
    }

    /// Commit `next` and only then make it the live collection. The caller
    /// holds the writer lock.
    fn apply(&self, _writer: &MutexGuard<'_, ()>, next: Vec<TranslationEntry>) -> AppResult<usize> {
        if let Err(e) = self.storage.commit(&next) {
            tracing::error!(error = %e, "history commit failed, mutation rolled back");
            return Err(e);
        }
        let size = next.len();
        *self.lock_entries() = next;
        Ok(size)
    }

    /// Insert at the front, evicting the oldest entries beyond capacity.
    ///
    /// Returns the stored entry; its timestamp is raised to the newest
    /// existing timestamp if the clock stepped backwards.
    pub fn append(&self, mut entry: TranslationEntry) -> AppResult<TranslationEntry> {
        let writer = self.lock_writer();
        let current = self.list();

        if current.iter().any(|existing| existing.id == entry.id) {
            return Err(AppError::Validation(format!(
                "History already contains entry {}",
                entry.id
            )));
        }
        if let Some(newest) = current.first() {
            if entry.timestamp < newest.timestamp {
                entry.timestamp = newest.timestamp;
            }
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(entry.clone());
        next.extend(current);
        let evicted = next.len().saturating_sub(self.capacity);
        next.truncate(self.capacity);

        let size = self.apply(&writer, next)?;
        tracing::info!(id = %entry.id, evicted, size, "history entry appended");
        Ok(entry)
    }

    /// Remove by id. Removing a missing id is a no-op and returns `false`.
    pub fn remove(&self, id: &str) -> AppResult<bool> {
        let writer = self.lock_writer();
        let current = self.list();

        if !current.iter().any(|entry| entry.id == id) {
            tracing::debug!(id, "history entry already gone");
            return Ok(false);
        }

        let next: Vec<_> = current.into_iter().filter(|entry| entry.id != id).collect();
        let size = self.apply(&writer, next)?;
        tracing::info!(id, size, "history entry removed");
        Ok(true)
    }

    pub fn clear(&self) -> AppResult<()> {
        let writer = self.lock_writer();
        self.apply(&writer, Vec::new())?;
        tracing::info!("history cleared");
        Ok(())
    }

    /// Snapshot of the collection, newest first. Later mutations do not
    /// affect a returned snapshot.
    pub fn list(&self) -> Vec<TranslationEntry> {
        self.lock_entries().clone()
    }

    pub fn get(&self, id: &str) -> Option<TranslationEntry> {
        self.lock_entries().iter().find(|entry| entry.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
