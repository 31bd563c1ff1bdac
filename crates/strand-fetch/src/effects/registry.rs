use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::data::{DestinationKind, TransferRequest, TransferSnapshot, TransferState};
use crate::error::{Error, Result};

/// Control signal observed by a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Running,
    Paused,
    Stopped,
}

/// Live bookkeeping for one accepted transfer.
#[derive(Debug)]
pub struct TransferRecord {
    id: String,
    name: String,
    kind: DestinationKind,
    chunk_count: u64,
    chunks_done: AtomicU64,
    state: Mutex<TransferState>,
    control: watch::Sender<Control>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TransferRecord {
    fn new(request: &TransferRequest) -> Self {
        Self {
            id: request.id().to_string(),
            name: request.descriptor.name.clone(),
            kind: request.kind,
            chunk_count: request.chunks_to_fetch(),
            chunks_done: AtomicU64::new(0),
            state: Mutex::new(TransferState::Queued),
            control: watch::Sender::new(Control::Running),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn chunks_done(&self) -> u64 {
        self.chunks_done.load(Ordering::Acquire)
    }

    /// Raises the progress counter; it never moves backwards.
    pub fn record_progress(&self, done: u64) -> u64 {
        self.chunks_done.fetch_max(done, Ordering::AcqRel).max(done)
    }

    pub fn state(&self) -> TransferState {
        *lock(&self.state)
    }

    pub fn set_state(&self, state: TransferState) {
        *lock(&self.state) = state;
    }

    pub fn control(&self) -> Control {
        *self.control.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.control() == Control::Paused
    }

    /// Returns `false` when the transfer was not running.
    pub fn pause(&self) -> bool {
        self.control.send_if_modified(|c| {
            let changed = *c == Control::Running;
            if changed {
                *c = Control::Paused;
            }
            changed
        })
    }

    /// Returns `false` when the transfer was not paused.
    pub fn resume(&self) -> bool {
        self.control.send_if_modified(|c| {
            let changed = *c == Control::Paused;
            if changed {
                *c = Control::Running;
            }
            changed
        })
    }

    /// Stopping is sticky: a stopped record never runs again.
    pub fn stop(&self) -> bool {
        self.control.send_if_modified(|c| {
            let changed = *c != Control::Stopped;
            *c = Control::Stopped;
            changed
        })
    }

    /// Parks while paused. Errors with [`Error::Stopped`] once stopped.
    pub async fn wait_while_paused(&self) -> Result<()> {
        let mut rx = self.control.subscribe();
        let control = *rx
            .wait_for(|c| *c != Control::Paused)
            .await
            .map_err(|_| Error::Stopped)?;
        match control {
            Control::Stopped => Err(Error::Stopped),
            _ => Ok(()),
        }
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        let mut rx = self.control.subscribe();
        let _ = rx.wait_for(|c| *c == Control::Stopped).await;
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            state: self.state(),
            chunks_done: self.chunks_done(),
            chunk_count: self.chunk_count,
            paused: self.is_paused(),
        }
    }
}

/// Set of in-flight transfers keyed by file id.
///
/// At most one record per id exists at any time. A record is owned by the
/// [`Registration`] returned from [`register`](Self::register) and leaves the
/// registry when that handle is dropped.
#[derive(Debug, Default)]
pub struct TransferRegistry {
    records: Mutex<HashMap<String, Arc<TransferRecord>>>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically checks for and inserts a record for the request's id.
    pub fn register(self: &Arc<Self>, request: &TransferRequest) -> Result<Registration> {
        let mut records = lock(&self.records);
        if records.contains_key(request.id()) {
            return Err(Error::AlreadyInProgress {
                id: request.id().to_string(),
            });
        }
        let record = Arc::new(TransferRecord::new(request));
        records.insert(record.id.clone(), Arc::clone(&record));
        debug!(id = %record.id, active = records.len(), "transfer registered");
        Ok(Registration {
            registry: Arc::clone(self),
            record,
        })
    }

    pub fn get(&self, id: &str) -> Option<Arc<TransferRecord>> {
        lock(&self.records).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.records).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unknown ids are a no-op and return `false`.
    pub fn pause(&self, id: &str) -> bool {
        self.get(id).is_some_and(|r| r.pause())
    }

    pub fn resume(&self, id: &str) -> bool {
        self.get(id).is_some_and(|r| r.resume())
    }

    pub fn stop(&self, id: &str) -> bool {
        self.get(id).is_some_and(|r| r.stop())
    }

    /// Applies `f` to every record, returning how many reported a change.
    pub fn for_each(&self, f: impl Fn(&TransferRecord) -> bool) -> usize {
        let records: Vec<_> = lock(&self.records).values().cloned().collect();
        records.iter().filter(|r| f(r)).count()
    }

    /// Snapshot of every active transfer, ordered by id.
    pub fn snapshot(&self) -> Vec<TransferSnapshot> {
        let mut snapshots: Vec<_> = lock(&self.records)
            .values()
            .map(|r| r.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    fn remove(&self, record: &Arc<TransferRecord>) {
        let mut records = lock(&self.records);
        // only remove our own record, never a successor registered under the same id
        if records
            .get(&record.id)
            .is_some_and(|current| Arc::ptr_eq(current, record))
        {
            records.remove(&record.id);
            debug!(id = %record.id, active = records.len(), "transfer deregistered");
        }
    }
}

/// Ownership of a registry entry. Dropping it deregisters the transfer.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<TransferRegistry>,
    record: Arc<TransferRecord>,
}

impl Registration {
    pub fn record(&self) -> &Arc<TransferRecord> {
        &self.record
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.record);
    }
}
