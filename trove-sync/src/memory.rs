//! In-memory document store.
//!
//! Single-process [`DocumentStore`] with real revision preconditions and
//! live queries. Suitable for tests and offline use.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::{SyncConfig, DEFAULT_SNAPSHOT_CHANNEL_CAPACITY};
use crate::store::{
    Document, DocumentStore, LiveQuery, Precondition, Query, QuerySnapshot, StoreError,
    StoreResult, WriteBatch, WriteOp,
};

#[derive(Debug, Clone)]
struct Stored {
    data: Value,
    revision: u64,
}

#[derive(Debug, Default)]
struct Documents {
    by_path: BTreeMap<String, Stored>,
    last_revision: u64,
}

impl Documents {
    fn document(&self, path: &str) -> Option<Document> {
        self.by_path.get(path).map(|stored| Document {
            path: path.to_string(),
            data: stored.data.clone(),
            revision: stored.revision,
        })
    }

    fn snapshot(&self, collection: &str) -> QuerySnapshot {
        let query = Query::collection(collection);
        let prefix = format!("{collection}/");
        let documents = self
            .by_path
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| query.covers(path))
            .filter_map(|(path, _)| self.document(path))
            .collect();
        let removed = match collection.rsplit_once('/') {
            Some((parent, _)) => !self.by_path.contains_key(parent),
            None => false,
        };
        QuerySnapshot {
            collection: collection.to_string(),
            documents,
            removed,
        }
    }
}

/// Statistics for the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreStats {
    /// Batches applied
    pub commits: u64,
    /// Batches rejected by a precondition
    pub rejected: u64,
    /// Snapshots pushed to live queries
    pub snapshots_sent: u64,
}

#[derive(Default)]
struct Counters {
    commits: AtomicU64,
    rejected: AtomicU64,
    snapshots_sent: AtomicU64,
}

/// In-memory [`DocumentStore`].
///
/// Cloning shares the underlying documents.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<Documents>>,
    listeners: Arc<Mutex<HashMap<String, broadcast::Sender<QuerySnapshot>>>>,
    available: Arc<AtomicBool>,
    counters: Arc<Counters>,
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocumentStore")
            .field("channel_capacity", &self.channel_capacity)
            .field("available", &self.available.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SNAPSHOT_CHANNEL_CAPACITY)
    }

    /// Create with a custom live-query channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            documents: Arc::new(RwLock::new(Documents::default())),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            counters: Arc::new(Counters::default()),
            channel_capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_capacity(config.snapshot_channel_capacity)
    }

    /// Simulate losing or regaining the connection. While unavailable every
    /// call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.by_path.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Get store statistics.
    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            commits: self.counters.commits.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            snapshots_sent: self.counters.snapshots_sent.load(Ordering::Relaxed),
        }
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn check(documents: &Documents, path: &str, precondition: Precondition) -> StoreResult<()> {
        let actual = documents.by_path.get(path).map(|s| s.revision);
        let holds = match precondition {
            Precondition::Exists => actual.is_some(),
            Precondition::Missing => actual.is_none(),
            Precondition::Revision(expected) => actual == Some(expected),
        };
        if holds {
            Ok(())
        } else {
            Err(StoreError::PreconditionFailed {
                path: path.to_string(),
                actual,
            })
        }
    }

    /// Push a fresh snapshot to every live query whose collection changed.
    fn notify(&self, documents: &Documents, touched: &BTreeSet<String>) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|_, sender| sender.receiver_count() > 0);

        for (collection, sender) in listeners.iter() {
            let affected = touched.iter().any(|path| {
                path.rsplit_once('/').map(|(parent, _)| parent) == Some(collection.as_str())
                    || collection
                        .rsplit_once('/')
                        .is_some_and(|(parent, _)| parent == path)
            });
            if affected && sender.send(documents.snapshot(collection)).is_ok() {
                self.counters.snapshots_sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn validate_doc_path(path: &str) -> StoreResult<()> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Document>> {
        self.ensure_available()?;
        validate_doc_path(path)?;
        Ok(self.documents.read().await.document(path))
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.ensure_available()?;
        let documents = self.documents.read().await;
        let matched = documents
            .by_path
            .keys()
            .filter_map(|path| documents.document(path))
            .filter(|doc| query.matches(doc))
            .collect();
        Ok(query.finish(matched))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        self.ensure_available()?;
        for write in batch.writes() {
            validate_doc_path(&write.path)?;
        }

        let mut documents = self.documents.write().await;
        for write in batch.writes() {
            if let Some(precondition) = write.precondition {
                if let Err(e) = Self::check(&documents, &write.path, precondition) {
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }

        let mut touched = BTreeSet::new();
        for write in batch {
            documents.last_revision += 1;
            let revision = documents.last_revision;
            match write.op {
                WriteOp::Set(data) => {
                    documents.by_path.insert(write.path.clone(), Stored { data, revision });
                }
                WriteOp::Merge(fields) => {
                    let entry = documents
                        .by_path
                        .entry(write.path.clone())
                        .or_insert_with(|| Stored {
                            data: Value::Object(serde_json::Map::new()),
                            revision,
                        });
                    if let Value::Object(existing) = &mut entry.data {
                        existing.extend(fields);
                    } else {
                        entry.data = Value::Object(fields);
                    }
                    entry.revision = revision;
                }
                WriteOp::Delete => {
                    documents.by_path.remove(&write.path);
                }
            }
            touched.insert(write.path);
        }

        self.counters.commits.fetch_add(1, Ordering::Relaxed);
        self.notify(&documents, &touched);
        Ok(())
    }

    async fn listen(&self, collection: &str) -> StoreResult<LiveQuery> {
        self.ensure_available()?;
        if collection.split('/').count() % 2 != 1 {
            return Err(StoreError::InvalidPath(collection.to_string()));
        }

        // Holding the read lock while subscribing means no commit can land
        // between the initial snapshot and the first pushed one.
        let documents = self.documents.read().await;
        let receiver = {
            let mut listeners = self.listeners.lock();
            listeners
                .entry(collection.to_string())
                .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
                .subscribe()
        };
        let initial = documents.snapshot(collection);
        tracing::debug!(collection, documents = initial.documents.len(), "Live query opened");

        Ok(LiveQuery::new(collection, initial, receiver))
    }
}
