//! Subscription lifecycle manager
//!
//! Keeps one live channel open per container the client needs:
//!
//! ```text
//! desired = baseline (owned containers) ∪ { id | ref_count(id) > 0 }
//! ```
//!
//! Every change to the baseline or a ref-count reconciles the open channels
//! against `desired`. Closing a channel purges the container's cached
//! children. A channel is one task per streamed child collection plus an
//! `active` flag that is flipped under the cache write lock, so a snapshot
//! racing teardown is dropped instead of resurrecting purged data. A channel
//! whose live queries failed or ended counts as closed and is reopened by
//! the next reconcile.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use trove_tree::ChildCollection;

use crate::cache::{CacheUpdate, LocalCache};
use crate::store::DocumentStore;

struct Channel {
    active: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Channel {
    /// A stream task only returns when its live query failed to open or
    /// ended; such a channel no longer feeds the cache.
    fn is_live(&self) -> bool {
        !self.tasks.iter().any(JoinHandle::is_finished)
    }
}

#[derive(Default)]
struct State {
    baseline: HashSet<Uuid>,
    ref_counts: HashMap<Uuid, usize>,
    channels: HashMap<Uuid, Channel>,
}

impl State {
    fn desired(&self) -> HashSet<Uuid> {
        self.baseline
            .iter()
            .chain(self.ref_counts.keys())
            .copied()
            .collect()
    }
}

/// Owns the live channels of one session.
///
/// Must be driven from within a Tokio runtime: opening a channel spawns
/// tasks.
pub struct SubscriptionManager {
    store: Arc<dyn DocumentStore>,
    cache: Arc<LocalCache>,
    state: Mutex<State>,
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SubscriptionManager")
            .field("baseline", &state.baseline.len())
            .field("retained", &state.ref_counts.len())
            .field("channels", &state.channels.len())
            .finish()
    }
}

impl SubscriptionManager {
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<LocalCache>) -> Self {
        Self {
            store,
            cache,
            state: Mutex::new(State::default()),
        }
    }

    /// Replace the baseline and reconcile.
    pub fn set_baseline(&self, ids: impl IntoIterator<Item = Uuid>) {
        let mut state = self.state.lock();
        state.baseline = ids.into_iter().collect();
        self.reconcile_locked(&mut state);
    }

    /// Add one container to the baseline and reconcile.
    pub fn extend_baseline(&self, id: Uuid) {
        let mut state = self.state.lock();
        if state.baseline.insert(id) {
            self.reconcile_locked(&mut state);
        }
    }

    pub fn baseline(&self) -> HashSet<Uuid> {
        self.state.lock().baseline.clone()
    }

    /// Increment the ref-count of a container.
    pub fn retain(&self, id: Uuid) {
        let mut state = self.state.lock();
        *state.ref_counts.entry(id).or_insert(0) += 1;
        self.reconcile_locked(&mut state);
    }

    /// Decrement the ref-count of a container; at zero it is forgotten.
    pub fn release(&self, id: Uuid) {
        let mut state = self.state.lock();
        match state.ref_counts.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.ref_counts.remove(&id);
            }
            None => {
                tracing::debug!(container_id = %id, "Release of a container that is not retained");
                return;
            }
        }
        self.reconcile_locked(&mut state);
    }

    /// Drop a container from the baseline and from the ref-counts, e.g.
    /// after it was deleted.
    pub fn forget(&self, id: Uuid) {
        let mut state = self.state.lock();
        state.baseline.remove(&id);
        state.ref_counts.remove(&id);
        self.reconcile_locked(&mut state);
    }

    /// Bring open channels in line with the desired set.
    pub fn reconcile(&self) {
        let mut state = self.state.lock();
        self.reconcile_locked(&mut state);
    }

    /// Forget everything and close every channel.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.baseline.clear();
        state.ref_counts.clear();
        self.reconcile_locked(&mut state);
    }

    /// Whether a live channel is open for the container.
    pub fn is_subscribed(&self, id: Uuid) -> bool {
        self.state.lock().channels.get(&id).is_some_and(Channel::is_live)
    }

    pub fn ref_count(&self, id: Uuid) -> usize {
        self.state.lock().ref_counts.get(&id).copied().unwrap_or(0)
    }

    /// Containers with a live channel.
    pub fn subscribed(&self) -> Vec<Uuid> {
        self.state
            .lock()
            .channels
            .iter()
            .filter(|(_, channel)| channel.is_live())
            .map(|(id, _)| *id)
            .collect()
    }

    fn reconcile_locked(&self, state: &mut State) {
        let desired = state.desired();

        let stale: Vec<Uuid> = state
            .channels
            .iter()
            .filter(|(id, channel)| !desired.contains(*id) || !channel.is_live())
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            if let Some(channel) = state.channels.remove(&id) {
                if desired.contains(&id) {
                    tracing::debug!(container_id = %id, "Channel lost its live query, reopening");
                }
                self.teardown(id, channel);
            }
        }

        for id in desired {
            if !state.channels.contains_key(&id) {
                let channel = self.open(id);
                state.channels.insert(id, channel);
            }
        }
    }

    fn open(&self, container_id: Uuid) -> Channel {
        let active = Arc::new(AtomicBool::new(true));
        let tasks = ChildCollection::STREAMED
            .into_iter()
            .map(|collection| {
                tokio::spawn(stream_collection(
                    self.store.clone(),
                    self.cache.clone(),
                    active.clone(),
                    container_id,
                    collection,
                ))
            })
            .collect();
        tracing::debug!(%container_id, "Channel opened");
        Channel { active, tasks }
    }

    fn teardown(&self, container_id: Uuid, channel: Channel) {
        {
            let mut cache = self.cache.write();
            channel.active.store(false, Ordering::Release);
            cache.purge_children(container_id);
        }
        for task in channel.tasks {
            task.abort();
        }
        tracing::debug!(%container_id, "Channel closed");
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        for (_, channel) in self.state.get_mut().channels.drain() {
            channel.active.store(false, Ordering::Release);
            for task in channel.tasks {
                task.abort();
            }
        }
    }
}

async fn stream_collection(
    store: Arc<dyn DocumentStore>,
    cache: Arc<LocalCache>,
    active: Arc<AtomicBool>,
    container_id: Uuid,
    collection: ChildCollection,
) {
    let path = collection.path(container_id);
    let mut live = match store.listen(&path).await {
        Ok(live) => live,
        Err(e) => {
            tracing::warn!(%path, error = %e, "Failed to open live query");
            return;
        }
    };

    while let Some(snapshot) = live.next().await {
        let Some(update) = CacheUpdate::decode(collection, container_id, &snapshot) else {
            return;
        };
        let documents = snapshot.documents.len();
        {
            let mut state = cache.write();
            if !active.load(Ordering::Acquire) {
                return;
            }
            state.apply(update);
        }
        tracing::debug!(%path, documents, removed = snapshot.removed, "Snapshot applied");
    }
    tracing::debug!(%path, "Live query ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use crate::store::WriteBatch;
    use std::time::Duration;
    use trove_tree::{path, Container, Item, Membership};

    struct Harness {
        store: MemoryDocumentStore,
        cache: Arc<LocalCache>,
        manager: SubscriptionManager,
    }

    fn harness() -> Harness {
        let store = MemoryDocumentStore::new();
        let cache = Arc::new(LocalCache::new());
        let manager = SubscriptionManager::new(Arc::new(store.clone()), cache.clone());
        Harness {
            store,
            cache,
            manager,
        }
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    async fn seed(store: &MemoryDocumentStore) -> (Container, Item) {
        let owner = uuid::Uuid::now_v7();
        let container = Container::new("Home", owner);
        let item = Item::new(container.id, "Cup", owner);
        let mut batch = WriteBatch::new();
        batch
            .set_record(path::container(container.id), &container)
            .unwrap()
            .set_record(path::item(container.id, item.id), &item)
            .unwrap()
            .set_record(
                path::membership(container.id, owner),
                &Membership::owner(container.id, owner),
            )
            .unwrap();
        store.commit(batch).await.unwrap();
        (container, item)
    }

    #[tokio::test]
    async fn test_retain_streams_children_into_cache() {
        let h = harness();
        let (container, item) = seed(&h.store).await;

        h.manager.retain(container.id);
        assert!(h.manager.is_subscribed(container.id));
        assert!(eventually(|| h.cache.items(container.id) == vec![item.clone()]).await);
        assert!(eventually(|| h.cache.memberships(container.id).len() == 1).await);

        let later = Item::new(container.id, "Pan", container.owner_id);
        let mut batch = WriteBatch::new();
        batch
            .set_record(path::item(container.id, later.id), &later)
            .unwrap();
        h.store.commit(batch).await.unwrap();
        assert!(eventually(|| h.cache.items(container.id).len() == 2).await);
    }

    #[tokio::test]
    async fn test_ref_counts_are_idempotent() {
        let h = harness();
        let (container, _) = seed(&h.store).await;

        h.manager.retain(container.id);
        h.manager.retain(container.id);
        h.manager.release(container.id);
        assert!(h.manager.is_subscribed(container.id));
        assert_eq!(h.manager.ref_count(container.id), 1);
        assert!(eventually(|| !h.cache.items(container.id).is_empty()).await);

        h.manager.release(container.id);
        assert!(!h.manager.is_subscribed(container.id));
        assert!(h.cache.items(container.id).is_empty());
        assert!(h.cache.memberships(container.id).is_empty());

        // stays purged: the channel's tasks are gone
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.cache.items(container.id).is_empty());
    }

    #[tokio::test]
    async fn test_release_without_retain_is_noop() {
        let h = harness();
        let id = Uuid::now_v7();
        h.manager.release(id);
        assert_eq!(h.manager.ref_count(id), 0);
        assert!(!h.manager.is_subscribed(id));
    }

    #[tokio::test]
    async fn test_baseline_survives_release() {
        let h = harness();
        let (container, _) = seed(&h.store).await;

        h.manager.set_baseline([container.id]);
        h.manager.retain(container.id);
        h.manager.release(container.id);
        assert!(h.manager.is_subscribed(container.id));

        h.manager.set_baseline([]);
        assert!(!h.manager.is_subscribed(container.id));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let h = harness();
        let (container, _) = seed(&h.store).await;
        h.manager.retain(container.id);
        h.manager.reconcile();
        h.manager.reconcile();
        assert_eq!(h.manager.subscribed(), vec![container.id]);
    }

    #[tokio::test]
    async fn test_reconcile_reopens_channel_whose_live_query_failed() {
        let h = harness();
        let (container, item) = seed(&h.store).await;

        h.store.set_available(false);
        h.manager.retain(container.id);
        assert!(eventually(|| !h.manager.is_subscribed(container.id)).await);
        assert!(h.manager.subscribed().is_empty());
        assert_eq!(h.manager.ref_count(container.id), 1);

        h.store.set_available(true);
        h.manager.reconcile();
        assert!(h.manager.is_subscribed(container.id));
        assert!(eventually(|| h.cache.items(container.id) == vec![item.clone()]).await);
        assert!(h.manager.is_subscribed(container.id));
    }

    #[tokio::test]
    async fn test_clear_closes_everything() {
        let h = harness();
        let (a, _) = seed(&h.store).await;
        let (b, _) = seed(&h.store).await;
        h.manager.set_baseline([a.id]);
        h.manager.retain(b.id);

        h.manager.clear();
        assert!(h.manager.subscribed().is_empty());
        assert!(h.manager.baseline().is_empty());
        assert_eq!(h.manager.ref_count(b.id), 0);
    }
}
