use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::utils::{self, generate_key, generate_peer_key};
use super::*;
use crate::config::{Config, ReservedIdentities};
use crate::metrics::{MetricsSink, TaskMetrics};

const DEFAULT_CAPACITY: usize = 1_024;

/// Both views of the registered fetch tasks.
///
/// They are only ever mutated together, under the same write lock.
#[derive(Debug)]
struct Indexes {
    /// Fetch tasks by `{cid}@{task_id}`.
    tasks: HashMap<String, FetchTask>,
    /// Client ids by `{peer_id}@{task_id}`.
    cids: HashMap<String, String>,
}

impl Default for Indexes {
    fn default() -> Self {
        Self {
            tasks: HashMap::with_capacity(DEFAULT_CAPACITY),
            cids: HashMap::with_capacity(DEFAULT_CAPACITY),
        }
    }
}

/// Supernode's fetch task manager.
///
/// A registry tracking which client downloads which content, on which peer and in which status. It implements the
/// [`TaskRegistry`] trait and hands out copies of the [`FetchTask`]s it owns.
///
/// Fetch tasks are indexed twice: by `(cid, task_id)` for point operations, and by `(peer_id, task_id)` to resolve
/// the client id a peer is using for some content. Both views live behind a single [`RwLock`], so that a registration,
/// a deletion or a status update, together with its metrics accounting, is observed as a whole or not at all.
///
/// The manager holds no global state: share it through an [`Arc`] between request handlers.
#[derive(Debug)]
pub struct TaskManager<R = Config> {
    /// Lookup of the supernode's own identities, whose fetch tasks are partially left out of metrics.
    identities: R,
    /// The fetch task views protected for concurrent R/W access.
    indexes: RwLock<Indexes>,
    /// Accounting of the fetch tasks.
    metrics: TaskMetrics,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<R: ReservedIdentities> TaskManager<R> {
    /// Create a new empty `TaskManager` recording metrics through the `metrics` crate facade.
    pub fn new(identities: R) -> Self {
        Self {
            identities,
            indexes: RwLock::default(),
            metrics: TaskMetrics::default(),
        }
    }

    /// Build a new `TaskManager` recording metrics to `sink`.
    ///
    /// The sink is called while the registry is locked: it must not call back into the registry.
    #[inline]
    pub fn with_metrics(self, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            metrics: TaskMetrics::new(sink),
            ..self
        }
    }

    /// Number of registered fetch tasks.
    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tasks.is_empty()
    }

    // every critical section leaves both views consistent, a poisoned lock can safely be reused
    fn read(&self) -> RwLockReadGuard<'_, Indexes> {
        self.indexes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indexes> {
        self.indexes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the peer view entry of a fetch task just removed from the task view, and account for its removal.
    fn unlink(&self, indexes: &mut Indexes, task: &FetchTask) {
        let peer_key = generate_peer_key(&task.peer_id, &task.task_id);

        // the entry may have been taken over by another client registered on the same peer for the same task
        if indexes.cids.get(&peer_key).is_some_and(|cid| *cid == task.cid) {
            indexes.cids.remove(&peer_key);
        }

        // fetch tasks of the supernode's own CDN downloads are not accounted
        if !self.identities.is_reserved_client(&task.cid) {
            self.metrics.dec_tasks(&task.call_system, task.status.as_str());
        }
    }

    /// Whether the fetch task registered by `cid` for `task_id` runs on `peer_id`.
    fn owns(indexes: &Indexes, cid: &str, peer_id: &str, task_id: &str) -> bool {
        generate_key(cid, task_id)
            .ok()
            .and_then(|key| indexes.tasks.get(&key))
            .is_some_and(|task| task.peer_id == peer_id)
    }

    /// Whether the peer view entry `peer_key` matched by a scan belongs to `(peer_id, task_id)`.
    ///
    /// Identifiers may contain the join char, so a key matched by prefix or suffix may actually belong to another
    /// `(peer_id, task_id)` split of it, in which case it is silently left out. Entries belonging to no fetch task at all
    /// are skipped with a warning.
    fn resolves(indexes: &Indexes, peer_key: &str, cid: &str, peer_id: &str, task_id: &str) -> bool {
        if Self::owns(indexes, cid, peer_id, task_id) {
            return true;
        }

        if !utils::splits(peer_key).any(|(owner_peer_id, owner_task_id)| Self::owns(indexes, cid, owner_peer_id, owner_task_id)) {
            tracing::warn!("Failed to resolve client id `{cid}` from peer key `{peer_key}`, skipping it");
        }

        false
    }
}

impl<R: ReservedIdentities> TaskRegistry for TaskManager<R> {
    /// Register a fetch task.
    ///
    /// Client ids are generated by the downloading clients and used as is: a new fetch task is expected for each
    /// download process, even when issued from the same machine. Registering an already registered `(cid, task_id)`
    /// pair replaces the previous fetch task, as if it had been deleted first.
    fn add(&self, task: FetchTask) -> Result<(), Error> {
        if task.path.is_empty() {
            return Err(Error::EmptyValue("path"));
        }

        if task.peer_id.is_empty() {
            return Err(Error::EmptyValue("peer_id"));
        }

        let key = generate_key(&task.cid, &task.task_id)?;

        let mut indexes = self.write();

        if let Some(replaced) = indexes.tasks.remove(&key) {
            tracing::debug!("Replacing fetch task `{key}` registered on peer `{}`", replaced.peer_id);

            self.unlink(&mut indexes, &replaced);
        }

        indexes.cids.insert(generate_peer_key(&task.peer_id, &task.task_id), task.cid.clone());

        // fetch tasks of the supernode's own CDN downloads are not accounted
        if !self.identities.is_reserved_peer(&task.peer_id) || !self.identities.is_reserved_client(&task.cid) {
            self.metrics.inc_tasks(&task.call_system, task.status.as_str());
            self.metrics.inc_registered(&task.call_system);
        }

        tracing::debug!("Registered fetch task `{key}` on peer `{}` with status {}", task.peer_id, task.status);

        indexes.tasks.insert(key, task);

        Ok(())
    }

    fn get(&self, cid: &str, task_id: &str) -> Result<FetchTask, Error> {
        let key = generate_key(cid, task_id)?;

        self.read().tasks.get(&key).cloned().ok_or_else(|| Error::not_found(key))
    }

    fn get_cid_by_peer_id_and_task_id(&self, peer_id: &str, task_id: &str) -> Result<String, Error> {
        let peer_key = generate_peer_key(peer_id, task_id);

        self.read().cids.get(&peer_key).cloned().ok_or_else(|| Error::not_found(peer_key))
    }

    fn get_cids_by_task_id(&self, task_id: &str) -> Vec<String> {
        let suffix = utils::task_suffix(task_id);
        let indexes = self.read();

        let cids: Vec<_> = indexes
            .cids
            .iter()
            .filter(|(peer_key, cid)| {
                peer_key
                    .strip_suffix(&suffix)
                    .is_some_and(|peer_id| Self::resolves(&indexes, peer_key, cid, peer_id, task_id))
            })
            .map(|(_, cid)| cid.clone())
            .collect();

        tracing::trace!("Found {} client ids for task `{task_id}`", cids.len());

        cids
    }

    fn get_cid_and_task_ids_by_peer_id(&self, peer_id: &str) -> HashMap<String, String> {
        let prefix = utils::peer_prefix(peer_id);
        let indexes = self.read();

        let mut result = HashMap::new();

        for (peer_key, cid) in &indexes.cids {
            let Some(task_id) = peer_key.strip_prefix(&prefix) else {
                continue;
            };

            if Self::resolves(&indexes, peer_key, cid, peer_id, task_id) {
                // a client id used for several tasks on the same peer only keeps the last one iterated
                result.insert(cid.clone(), task_id.to_owned());
            }
        }

        tracing::trace!("Found {} client ids on peer `{peer_id}`", result.len());

        result
    }

    fn list(&self, _filter: &HashMap<String, String>) -> Vec<FetchTask> {
        Vec::new()
    }

    fn delete(&self, cid: &str, task_id: &str) -> Result<(), Error> {
        let key = generate_key(cid, task_id)?;

        let mut indexes = self.write();

        let task = indexes.tasks.remove(&key).ok_or_else(|| Error::not_found(&key))?;

        self.unlink(&mut indexes, &task);

        tracing::debug!("Deleted fetch task `{key}` from peer `{}`", task.peer_id);

        Ok(())
    }

    /// Update the status of a fetch task.
    ///
    /// A successful fetch task keeps its status, but requesting a [`TaskStatus::Failed`] status always counts as a
    /// failure.
    fn update_status(&self, cid: &str, task_id: &str, status: TaskStatus) -> Result<(), Error> {
        let key = generate_key(cid, task_id)?;

        let mut indexes = self.write();

        let task = indexes.tasks.get_mut(&key).ok_or_else(|| Error::not_found(&key))?;

        if task.status != TaskStatus::Success {
            self.metrics.dec_tasks(&task.call_system, task.status.as_str());
            self.metrics.inc_tasks(&task.call_system, status.as_str());

            tracing::debug!("Updating fetch task `{key}` status from {} to {status}", task.status);

            task.status = status;
        }

        if status == TaskStatus::Failed {
            self.metrics.inc_failed(&task.call_system);
        }

        Ok(())
    }
}
