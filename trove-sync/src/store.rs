//! Document store boundary
//!
//! The remote authoritative store is a tree of JSON documents addressed by
//! slash-separated paths. This core needs point reads, equality queries,
//! atomic batches with per-document preconditions and push-based live
//! queries over one collection. Nothing vendor-specific crosses this trait.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::broadcast;

/// Document store error types.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write's precondition did not hold; nothing in the batch was applied
    #[error("Precondition failed for {path}")]
    PreconditionFailed {
        path: String,
        /// Revision found, `None` if the document is missing
        actual: Option<u64>,
    },

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed document or collection path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Encode a value for storage.
pub fn encode<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub data: Value,
    /// Bumped by every write to this document
    pub revision: u64,
}

impl Document {
    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Decode into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| StoreError::Serialization(format!("{}: {}", self.path, e)))
    }

    /// A top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// What a query reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    /// One collection path, e.g. `containers/{id}/items`
    Collection(String),
    /// Every collection with this final segment, e.g. `memberships`
    CollectionGroup(String),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality-filtered, optionally ordered and limited query.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trove_sync::store::{Direction, Query};
///
/// let query = Query::collection_group("memberships")
///     .where_eq("userId", json!("u-1"))
///     .order_by("assignedAt", Direction::Descending)
///     .limit(10);
/// assert_eq!(query.limit, Some(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: QuerySource,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            source: QuerySource::Collection(path.into()),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn collection_group(name: impl Into<String>) -> Self {
        Self {
            source: QuerySource::CollectionGroup(name.into()),
            ..Self::collection(String::new())
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document at `path` belongs to this query's source.
    pub fn covers(&self, path: &str) -> bool {
        let Some((parent, _)) = path.rsplit_once('/') else {
            return false;
        };
        match &self.source {
            QuerySource::Collection(collection) => parent == collection,
            QuerySource::CollectionGroup(name) => {
                parent.rsplit('/').next() == Some(name.as_str())
            }
        }
    }

    /// Whether a document passes every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.covers(&doc.path)
            && self
                .filters
                .iter()
                .all(|(field, value)| doc.field(field) == Some(value))
    }

    /// Order and limit an already-filtered result set.
    ///
    /// Ties on the order field break on document path in the same
    /// direction, so ids that grow over time (UUID v7) order newest last.
    pub fn finish(&self, mut docs: Vec<Document>) -> Vec<Document> {
        match &self.order_by {
            Some((field, direction)) => {
                docs.sort_by(|a, b| {
                    let ord = compare_values(a.field(field), b.field(field))
                        .then_with(|| a.path.cmp(&b.path));
                    match direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                });
            }
            None => docs.sort_by(|a, b| a.path.cmp(&b.path)),
        }
        if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

/// Total order over JSON field values: missing < null < bool < number < string.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Condition a write requires of the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Document must exist
    Exists,
    /// Document must not exist
    Missing,
    /// Document must exist at exactly this revision
    Revision(u64),
}

/// What a write does.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Replace the whole document
    Set(Value),
    /// Overwrite the given top-level fields, keep the rest
    Merge(serde_json::Map<String, Value>),
    Delete,
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub path: String,
    pub op: WriteOp,
    pub precondition: Option<Precondition>,
}

/// Writes applied atomically: all or none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: impl Into<String>, data: Value) -> &mut Self {
        self.push(path, WriteOp::Set(data), None)
    }

    /// Encode and set a typed record.
    pub fn set_record<T: Serialize>(&mut self, path: impl Into<String>, record: &T) -> StoreResult<&mut Self> {
        let data = encode(record)?;
        Ok(self.set(path, data))
    }

    pub fn set_checked(
        &mut self,
        path: impl Into<String>,
        data: Value,
        precondition: Precondition,
    ) -> &mut Self {
        self.push(path, WriteOp::Set(data), Some(precondition))
    }

    pub fn merge_checked(
        &mut self,
        path: impl Into<String>,
        fields: serde_json::Map<String, Value>,
        precondition: Precondition,
    ) -> &mut Self {
        self.push(path, WriteOp::Merge(fields), Some(precondition))
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.push(path, WriteOp::Delete, None)
    }

    pub fn delete_checked(&mut self, path: impl Into<String>, precondition: Precondition) -> &mut Self {
        self.push(path, WriteOp::Delete, Some(precondition))
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, op: WriteOp, precondition: Option<Precondition>) -> &mut Self {
        self.writes.push(Write {
            path: path.into(),
            op,
            precondition,
        });
        self
    }
}

impl IntoIterator for WriteBatch {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

/// Full contents of a collection at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    /// Collection path
    pub collection: String,
    pub documents: Vec<Document>,
    /// The collection's parent document no longer exists
    pub removed: bool,
}

/// Push-based stream of [`QuerySnapshot`]s for one collection.
///
/// The first call to [`next`](Self::next) yields the state at the time the
/// query was opened. Every snapshot is complete, so a lagging receiver skips
/// ahead to the newest one instead of replaying.
pub struct LiveQuery {
    collection: String,
    initial: Option<QuerySnapshot>,
    receiver: broadcast::Receiver<QuerySnapshot>,
}

impl std::fmt::Debug for LiveQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("collection", &self.collection)
            .finish()
    }
}

impl LiveQuery {
    pub fn new(
        collection: impl Into<String>,
        initial: QuerySnapshot,
        receiver: broadcast::Receiver<QuerySnapshot>,
    ) -> Self {
        Self {
            collection: collection.into(),
            initial: Some(initial),
            receiver,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next snapshot, or `None` once the store has dropped the query.
    pub async fn next(&mut self) -> Option<QuerySnapshot> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(collection = %self.collection, skipped, "Live query lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Remote authoritative document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read.
    async fn get(&self, path: &str) -> StoreResult<Option<Document>>;

    /// Run a query.
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Apply a batch atomically. If any precondition fails nothing is
    /// written and [`StoreError::PreconditionFailed`] names the first one.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Open a live query over one collection.
    async fn listen(&self, collection: &str) -> StoreResult<LiveQuery>;
}
