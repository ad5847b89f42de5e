//! In-process storage backend.
//!
//! Keeps every collection in a map behind a mutex. Used when no database
//! file is wanted and throughout the test suites, where it can also be
//! switched into a failing mode to exercise degraded paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::storage::{
    Collection, Document, IndexEntry, Order, Query, StorageBackend, StoredDocument,
};

#[derive(Default)]
struct Table {
    /// seq → (key, body, index)
    rows: BTreeMap<u64, (String, serde_json::Value, Vec<IndexEntry>)>,
    keys: HashMap<String, u64>,
    next_seq: u64,
}

impl Table {
    fn upsert(&mut self, document: Document) {
        let seq = match self.keys.get(&document.key) {
            Some(seq) => *seq,
            None => {
                self.next_seq += 1;
                self.keys.insert(document.key.clone(), self.next_seq);
                self.next_seq
            }
        };
        self.rows
            .insert(seq, (document.key, document.body, document.index));
    }
}

/// A storage backend holding everything in memory.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<Collection, Table>>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
    write_count: AtomicU32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Make writes fail with [`StoreError::Backend`] while reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Number of successful write calls.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::Relaxed)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("memory backend marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_available()?;
        if self.fail_writes.load(Ordering::Relaxed) {
            Err(StoreError::Backend("memory backend rejecting writes".into()))
        } else {
            Ok(())
        }
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Collection, Table>) -> T,
    ) -> Result<T, StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".into()))?;
        Ok(f(&mut tables))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        self.check_available()?;
        self.with_tables(|tables| {
            let table = tables.get(&collection)?;
            let seq = *table.keys.get(key)?;
            table.rows.get(&seq).map(|(key, body, _)| StoredDocument {
                key: key.clone(),
                seq,
                body: body.clone(),
            })
        })
    }

    async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        self.check_writable()?;
        self.with_tables(|tables| tables.entry(collection).or_default().upsert(document))?;
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn put_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError> {
        self.check_writable()?;
        let count = documents.len();
        self.with_tables(|tables| {
            let table = tables.entry(collection).or_default();
            for document in documents {
                table.upsert(document);
            }
        })?;
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(count)
    }

    async fn append(&self, collection: Collection, document: Document) -> Result<u64, StoreError> {
        self.check_writable()?;
        let seq = self.with_tables(|tables| {
            let table = tables.entry(collection).or_default();
            let seq = table.next_seq + 1;
            table.upsert(Document {
                key: seq.to_string(),
                ..document
            });
            seq
        })?;
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(seq)
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.check_available()?;
        query.check_fields(collection)?;
        self.with_tables(|tables| {
            let Some(table) = tables.get(&collection) else {
                return Vec::new();
            };
            let matching = table
                .rows
                .iter()
                .filter(|(_, (_, _, index))| query.matches(index));
            let ordered: Box<dyn Iterator<Item = _> + '_> = match query.order {
                Order::Ascending => Box::new(matching),
                Order::Descending => Box::new(matching.rev()),
            };
            ordered
                .skip(query.offset)
                .take(query.limit.unwrap_or(usize::MAX))
                .map(|(seq, (key, body, _))| StoredDocument {
                    key: key.clone(),
                    seq: *seq,
                    body: body.clone(),
                })
                .collect()
        })
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        self.check_available()?;
        self.with_tables(|tables| tables.get(&collection).map_or(0, |t| t.rows.len()))
    }
}
