use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use strand_fs::{Filesystem, LocalFilesystem};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chunk::{ChunkFetcher, ChunkSource, Decryptor};
use super::guard::{CacheEvictor, DiskSpaceGuard, NoEviction};
use super::limiter::{Limiter, LimiterPermit};
use super::placement::Placer;
use super::platform::{
    AssumeOnline, Connectivity, DirectoryLayout, MediaStore, NetworkMonitor, NoOfflineIndex,
    OfflineIndex, PathResolver,
};
use super::registry::{Registration, TransferRecord, TransferRegistry};
use super::sink::OrderedWriteSink;
use crate::core::{RetryPolicy, is_resumable, plan_waves};
use crate::data::{
    DestinationKind, EngineConfig, EventSink, NoopSink, Notice, Placement, TransferEvent,
    TransferRequest, TransferSnapshot, TransferState,
};
use crate::error::{Error, Result};

/// Transfer orchestrator.
///
/// Cheap to clone; clones share the registry and both limiters.
pub struct Engine<S, D> {
    inner: Arc<Inner<S, D>>,
}

impl<S, D> Clone for Engine<S, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S, D> {
    config: EngineConfig,
    fetcher: ChunkFetcher<S, D>,
    fs: Arc<dyn Filesystem>,
    paths: Arc<dyn PathResolver>,
    network: Arc<dyn NetworkMonitor>,
    guard: DiskSpaceGuard,
    placer: Placer,
    events: Arc<dyn EventSink>,
    registry: Arc<TransferRegistry>,
    transfer_slots: Limiter,
    chunk_slots: Limiter,
}

/// Configures an [`Engine`]. Every collaborator except the chunk source and
/// the decryptor has a default.
pub struct EngineBuilder<S, D> {
    source: S,
    decryptor: D,
    config: EngineConfig,
    fs: Option<Arc<dyn Filesystem>>,
    evictor: Option<Arc<dyn CacheEvictor>>,
    paths: Option<Arc<dyn PathResolver>>,
    network: Option<Arc<dyn NetworkMonitor>>,
    media_store: Option<Arc<dyn MediaStore>>,
    offline_index: Option<Arc<dyn OfflineIndex>>,
    events: Option<Arc<dyn EventSink>>,
}

impl<S, D> EngineBuilder<S, D>
where
    S: ChunkSource + 'static,
    D: Decryptor + 'static,
{
    pub fn new(source: S, decryptor: D) -> Self {
        Self {
            source,
            decryptor,
            config: EngineConfig::default(),
            fs: None,
            evictor: None,
            paths: None,
            network: None,
            media_store: None,
            offline_index: None,
            events: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn filesystem(mut self, fs: Arc<dyn Filesystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn evictor(mut self, evictor: Arc<dyn CacheEvictor>) -> Self {
        self.evictor = Some(evictor);
        self
    }

    /// Defaults to a [`DirectoryLayout`] over the configured directories.
    pub fn paths(mut self, paths: Arc<dyn PathResolver>) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn network(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    /// Downloads go to the media store instead of the download directory.
    pub fn media_store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.media_store = Some(store);
        self
    }

    pub fn offline_index(mut self, index: Arc<dyn OfflineIndex>) -> Self {
        self.offline_index = Some(index);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<Engine<S, D>> {
        let config = self.config;
        config.validate()?;

        let fs = self.fs.unwrap_or_else(|| Arc::new(LocalFilesystem::new()));
        let paths = self
            .paths
            .unwrap_or_else(|| Arc::new(DirectoryLayout::new(config.dirs.clone())));
        let guard = DiskSpaceGuard::new(
            Arc::clone(&fs),
            self.evictor.unwrap_or_else(|| Arc::new(NoEviction)),
            paths.temp_dir(),
            config.space.buffer_bytes,
            config.space.settle(),
        );
        let placer = Placer::new(
            Arc::clone(&fs),
            Arc::clone(&paths),
            self.media_store,
            self.offline_index.unwrap_or_else(|| Arc::new(NoOfflineIndex)),
        );

        let inner = Inner {
            fetcher: ChunkFetcher::new(
                self.source,
                self.decryptor,
                RetryPolicy::from(&config.retry),
            ),
            fs,
            paths,
            network: self.network.unwrap_or_else(|| Arc::new(AssumeOnline)),
            guard,
            placer,
            events: self.events.unwrap_or_else(|| Arc::new(NoopSink)),
            registry: Arc::new(TransferRegistry::new()),
            transfer_slots: Limiter::new("transfers", config.max_concurrent_transfers),
            chunk_slots: Limiter::new("chunks", config.max_concurrent_chunks),
            config,
        };
        Ok(Engine {
            inner: Arc::new(inner),
        })
    }
}

/// A transfer running on its own task.
#[derive(Debug)]
pub struct TransferHandle {
    id: String,
    task: JoinHandle<Result<Placement>>,
}

impl TransferHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the transfer to reach a terminal state.
    pub async fn outcome(self) -> Result<Placement> {
        self.task.await.map_err(|e| Error::Task(e.to_string()))?
    }
}

impl<S, D> Engine<S, D>
where
    S: ChunkSource + 'static,
    D: Decryptor + 'static,
{
    pub fn builder(source: S, decryptor: D) -> EngineBuilder<S, D> {
        EngineBuilder::new(source, decryptor)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Runs a transfer to completion on the current task.
    ///
    /// Returns [`Error::Stopped`] when stopped through [`stop`](Self::stop).
    pub async fn start(&self, request: TransferRequest) -> Result<Placement> {
        let registration = self.inner.admit(&request)?;
        self.inner.run(request, registration).await
    }

    /// Registers the transfer now and runs it on a tokio task.
    ///
    /// Admission errors such as [`Error::AlreadyInProgress`] are returned
    /// immediately rather than through the handle.
    pub fn spawn(&self, request: TransferRequest) -> Result<TransferHandle> {
        let registration = self.inner.admit(&request)?;
        let id = request.id().to_string();
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run(request, registration).await });
        Ok(TransferHandle { id, task })
    }

    pub fn pause(&self, id: &str) -> bool {
        self.inner.registry.pause(id)
    }

    pub fn resume(&self, id: &str) -> bool {
        self.inner.registry.resume(id)
    }

    pub fn stop(&self, id: &str) -> bool {
        self.inner.registry.stop(id)
    }

    pub fn pause_all(&self) -> usize {
        self.inner.registry.for_each(TransferRecord::pause)
    }

    pub fn resume_all(&self) -> usize {
        self.inner.registry.for_each(TransferRecord::resume)
    }

    pub fn stop_all(&self) -> usize {
        self.inner.registry.for_each(TransferRecord::stop)
    }

    /// Stops every transfer and refuses new slot acquisitions.
    pub fn shutdown(&self) {
        let stopped = self.stop_all();
        self.inner.transfer_slots.close();
        self.inner.chunk_slots.close();
        info!(stopped, "engine shut down");
    }

    pub fn transfers(&self) -> Vec<TransferSnapshot> {
        self.inner.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.inner.registry
    }

    pub fn transfer_slots(&self) -> &Limiter {
        &self.inner.transfer_slots
    }

    pub fn chunk_slots(&self) -> &Limiter {
        &self.inner.chunk_slots
    }
}

impl<S, D> Inner<S, D>
where
    S: ChunkSource + 'static,
    D: Decryptor + 'static,
{
    fn emit(&self, event: TransferEvent) {
        self.events.emit(event);
    }

    fn notify(&self, notice: Notice) {
        self.emit(TransferEvent::Notice { notice });
    }

    /// Preflight and registration. Rejections produce one notice and no
    /// record.
    fn admit(&self, request: &TransferRequest) -> Result<Registration> {
        let result = self.preflight(request).and_then(|()| self.registry.register(request));
        if let Err(e) = &result {
            info!(id = %request.id(), error = %e, "transfer rejected");
            self.notify(notice_for(e, &request.descriptor.name));
        }
        result
    }

    fn preflight(&self, request: &TransferRequest) -> Result<()> {
        if self.chunk_slots.is_closed() {
            return Err(Error::Shutdown);
        }
        request.descriptor.validate()?;
        match self.network.connectivity() {
            Connectivity::Offline => Err(Error::DeviceOffline),
            Connectivity::Cellular if self.config.wifi_only => Err(Error::WifiRequired),
            _ => Ok(()),
        }
    }

    fn temp_path(&self, request: &TransferRequest) -> PathBuf {
        request
            .temp_path
            .clone()
            .unwrap_or_else(|| self.paths.temp_path(&request.descriptor))
    }

    async fn run(&self, request: TransferRequest, registration: Registration) -> Result<Placement> {
        let record = Arc::clone(registration.record());
        let temp = self.temp_path(&request);
        self.emit(TransferEvent::StateChanged {
            id: record.id().to_string(),
            state: TransferState::Queued,
        });

        // set once this run has opened or adopted the temp file
        let mut owns_temp = false;
        let staged = tokio::select! {
            biased;
            _ = record.stopped() => Err(Error::Stopped),
            result = self.stage(&request, &record, &temp, &mut owns_temp) => result,
        };

        // finalization runs to completion; a stop arriving now is ignored
        let outcome = match staged {
            Ok(Staged::Reused(placement)) => Ok(placement),
            Ok(Staged::Ready(slot)) => {
                let placed = self.placer.place(&request, &temp).await;
                drop(slot);
                placed
            }
            Err(e) => Err(e),
        };

        if outcome.is_err() && owns_temp {
            self.discard(&temp).await;
        }
        drop(registration);
        self.report(&request, &outcome);
        outcome
    }

    /// Admission and fetching, up to a complete temp file. This is the
    /// stoppable part of a transfer.
    async fn stage(
        &self,
        request: &TransferRequest,
        record: &TransferRecord,
        temp: &Path,
        owns_temp: &mut bool,
    ) -> Result<Staged> {
        let id = request.id();
        if let Some(placement) = self.placer.reuse_offline(request).await? {
            debug!(id, "served from offline copy");
            return Ok(Staged::Reused(placement));
        }

        let slot = if request.kind.needs_transfer_slot() {
            Some(self.transfer_slots.acquire().await?)
        } else {
            None
        };

        self.fs.create_dir_all(self.paths.temp_dir()).await?;
        if let Some(parent) = temp.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        let expected = request.expected_bytes();
        self.guard.ensure(expected).await?;
        self.transition(record, TransferState::Admitted);
        info!(id, kind = ?request.kind, chunks = record.chunk_count(), "transfer admitted");

        let total = request.chunks_to_fetch();
        *owns_temp = true;
        if self.resumable(request, temp).await? {
            debug!(id, path = %temp.display(), "reusing complete temp file");
            self.transition(record, TransferState::Fetching);
            self.progress(record, total);
            self.transition(record, TransferState::Finalizing);
        } else {
            let sink = OrderedWriteSink::open(self.fs.as_ref(), temp).await?;
            self.transition(record, TransferState::Fetching);
            for wave in plan_waves(total, self.config.max_concurrent_chunks) {
                debug!(id, start = wave.start, end = wave.end, "dispatching wave");
                let mut pending: FuturesUnordered<_> = wave
                    .map(|index| self.fetch_and_commit(request, record, &sink, index))
                    .collect();
                while let Some(result) = pending.next().await {
                    result?;
                }
            }
            self.transition(record, TransferState::Finalizing);
            let bytes = sink.finish().await?;
            debug!(id, bytes, "temp file complete");
        }

        Ok(Staged::Ready(slot))
    }

    async fn fetch_and_commit(
        &self,
        request: &TransferRequest,
        record: &TransferRecord,
        sink: &OrderedWriteSink,
        index: u64,
    ) -> Result<()> {
        record.wait_while_paused().await?;
        let slot = self.chunk_slots.acquire().await?;
        let plain = self.fetcher.fetch(&request.descriptor, index).await?;
        // free the slot before queueing on the sink so waiting chunks do not starve other files
        slot.release();
        sink.submit(index, plain).await?;
        self.progress(record, index + 1);
        Ok(())
    }

    /// Whether a leftover temp file is taken as complete. A stale one is removed.
    async fn resumable(&self, request: &TransferRequest, temp: &Path) -> Result<bool> {
        if !self.fs.exists(temp).await? {
            return Ok(false);
        }
        let existing = self.fs.size(temp).await?;
        let expected = request.expected_bytes();
        if is_resumable(existing, expected, self.config.resume_tolerance_bytes) {
            return Ok(true);
        }
        debug!(id = %request.id(), existing, expected, "discarding partial temp file");
        self.fs.remove_file(temp).await?;
        Ok(false)
    }

    fn transition(&self, record: &TransferRecord, state: TransferState) {
        record.set_state(state);
        self.emit(TransferEvent::StateChanged {
            id: record.id().to_string(),
            state,
        });
    }

    fn progress(&self, record: &TransferRecord, done: u64) {
        let chunks_done = record.record_progress(done);
        self.emit(TransferEvent::Progress {
            id: record.id().to_string(),
            chunks_done,
            chunk_count: record.chunk_count(),
        });
    }

    async fn discard(&self, temp: &Path) {
        match self.fs.remove_file(temp).await {
            Ok(()) => debug!(path = %temp.display(), "temp file removed"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(path = %temp.display(), error = %e, "cannot remove temp file"),
        }
    }

    fn report(&self, request: &TransferRequest, outcome: &Result<Placement>) {
        let id = request.id().to_string();
        let name = &request.descriptor.name;
        match outcome {
            Ok(placement) => {
                info!(%id, ?placement, "transfer complete");
                self.emit(TransferEvent::Completed {
                    id: id.clone(),
                    placement: placement.clone(),
                });
                if let Placement::Offline(_) = placement {
                    self.emit(TransferEvent::MarkedOffline { id });
                }
                if request.notify_on_success {
                    let name = name.clone();
                    match request.kind {
                        DestinationKind::OfflineCache if request.offline_update => {
                            self.notify(Notice::OfflineUpdated { name })
                        }
                        DestinationKind::OfflineCache => self.notify(Notice::StoredOffline { name }),
                        DestinationKind::Download => self.notify(Notice::Downloaded { name }),
                        DestinationKind::Preview => {}
                    }
                }
            }
            Err(Error::Stopped) => {
                info!(%id, "transfer stopped");
                self.emit(TransferEvent::Stopped { id });
            }
            Err(e) => {
                warn!(%id, error = %e, "transfer failed");
                self.emit(TransferEvent::Failed {
                    id,
                    name: name.clone(),
                    reason: e.to_string(),
                });
                self.notify(notice_for(e, name));
            }
        }
    }
}

/// Result of the stoppable stage of a transfer.
enum Staged {
    /// Served from an existing offline copy, nothing fetched.
    Reused(Placement),
    /// Temp file complete; holds the whole-file slot until placed.
    Ready(Option<LimiterPermit>),
}

fn notice_for(error: &Error, name: &str) -> Notice {
    let name = name.to_string();
    match error {
        Error::AlreadyInProgress { .. } => Notice::AlreadyDownloading { name },
        Error::DeviceOffline => Notice::DeviceOffline { name },
        Error::WifiRequired => Notice::WifiRequired { name },
        Error::OutOfStorage { .. } => Notice::OutOfStorage { name },
        other => Notice::TransferFailed {
            name,
            reason: other.to_string(),
        },
    }
}
