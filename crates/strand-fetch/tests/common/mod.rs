#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use strand_fetch::{
    BoxError, CHUNK_SIZE, CacheEvictor, ChunkAddress, ChunkSource, Decryptor, DirConfig, Engine,
    EngineBuilder, EngineConfig, EventSink, FileDescriptor, MediaStore, OfflineIndex,
    TransferEvent, temp_file_name,
};
use strand_fs::{Filesystem, LocalFilesystem, WriteStream};
use tempfile::TempDir;
use tokio::sync::watch;

pub const MIB: u64 = 1024 * 1024;

pub fn descriptor(id: &str, size: u64) -> FileDescriptor {
    FileDescriptor {
        id: id.to_string(),
        region: "eu-1".to_string(),
        bucket: "b42".to_string(),
        size,
        chunk_count: FileDescriptor::chunks_for(size),
        name: format!("{id}.bin"),
        mime: "application/octet-stream".to_string(),
        key: "k3y".to_string(),
        version: 2,
    }
}

/// Deterministic file body, different per id.
pub fn content(id: &str, size: u64) -> Vec<u8> {
    let seed = id.bytes().fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    (0..size).map(|i| ((i.wrapping_mul(131) + seed) % 251) as u8).collect()
}

fn xor(data: &[u8], key: &str, version: u32) -> Vec<u8> {
    let pad = key.bytes().fold(version as u8, |acc, b| acc ^ b);
    data.iter().map(|b| b ^ pad).collect()
}

/// Encrypts `plain` the way [`XorCipher`] expects for `descriptor`.
pub fn encrypt(descriptor: &FileDescriptor, plain: &[u8]) -> Vec<u8> {
    xor(plain, &descriptor.key, descriptor.version)
}

/// Symmetric toy cipher standing in for the real chunk decryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorCipher;

impl Decryptor for XorCipher {
    type Error = String;

    fn decrypt(&self, ciphertext: Bytes, key: &str, version: u32) -> Result<Bytes, String> {
        if key.is_empty() {
            return Err("missing key".into());
        }
        Ok(Bytes::from(xor(&ciphertext, key, version)))
    }
}

struct SourceState {
    chunks: Mutex<HashMap<String, Vec<Bytes>>>,
    delays: Mutex<HashMap<(String, u64), Duration>>,
    failures: Mutex<HashMap<(String, u64), u32>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    held: watch::Sender<HashSet<String>>,
}

impl Default for SourceState {
    fn default() -> Self {
        Self {
            chunks: Mutex::default(),
            delays: Mutex::default(),
            failures: Mutex::default(),
            calls: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            held: watch::Sender::new(HashSet::new()),
        }
    }
}

/// In-memory chunk store with scripted latency, failures and holds.
#[derive(Clone, Default)]
pub struct MockSource {
    state: Arc<SourceState>,
}

impl MockSource {
    /// Splits `plain` into chunks and stores them encrypted.
    pub fn add_file(&self, descriptor: &FileDescriptor, plain: &[u8]) {
        let chunks = plain
            .chunks(CHUNK_SIZE as usize)
            .map(|c| Bytes::from(xor(c, &descriptor.key, descriptor.version)))
            .collect();
        self.state
            .chunks
            .lock()
            .unwrap()
            .insert(descriptor.id.clone(), chunks);
    }

    pub fn delay(&self, id: &str, index: u64, delay: Duration) {
        self.state
            .delays
            .lock()
            .unwrap()
            .insert((id.to_string(), index), delay);
    }

    /// Fails the next `times` fetches of one chunk.
    pub fn fail(&self, id: &str, index: u64, times: u32) {
        self.state
            .failures
            .lock()
            .unwrap()
            .insert((id.to_string(), index), times);
    }

    /// Parks every fetch for `id` until [`release`](Self::release).
    pub fn hold(&self, id: &str) {
        self.state.held.send_modify(|held| {
            held.insert(id.to_string());
        });
    }

    pub fn release(&self, id: &str) {
        self.state.held.send_modify(|held| {
            held.remove(id);
        });
    }

    pub fn calls(&self) -> usize {
        self.state.calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.state.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ChunkSource for MockSource {
    type Error = String;

    async fn fetch(&self, address: &ChunkAddress) -> Result<Bytes, String> {
        let state = &self.state;
        *state
            .calls
            .lock()
            .unwrap()
            .entry(address.id.clone())
            .or_default() += 1;

        let mut held = state.held.subscribe();
        let _ = held.wait_for(|held| !held.contains(&address.id)).await;

        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let key = (address.id.clone(), address.index);
        let delay = state.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut failures = state.failures.lock().unwrap();
            match failures.get_mut(&key) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    Err("injected failure".to_string())
                }
                _ => state
                    .chunks
                    .lock()
                    .unwrap()
                    .get(&address.id)
                    .and_then(|chunks| chunks.get(address.index as usize))
                    .cloned()
                    .ok_or_else(|| format!("no chunk {address}")),
            }
        };
        state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Local disk with a scripted free-space reading.
pub struct SpaceFs {
    inner: LocalFilesystem,
    free: AtomicU64,
}

impl SpaceFs {
    pub fn new(free: u64) -> Self {
        Self {
            inner: LocalFilesystem::new(),
            free: AtomicU64::new(free),
        }
    }

    pub fn set_free(&self, free: u64) {
        self.free.store(free, Ordering::SeqCst);
    }

    pub fn add_free(&self, bytes: u64) {
        self.free.fetch_add(bytes, Ordering::SeqCst);
    }
}

impl Filesystem for SpaceFs {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, strand_fs::Result<bool>> {
        self.inner.exists(path)
    }

    fn size<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, strand_fs::Result<u64>> {
        self.inner.size(path)
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, strand_fs::Result<()>> {
        self.inner.create_dir_all(path)
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, strand_fs::Result<()>> {
        self.inner.remove_file(path)
    }

    fn move_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, strand_fs::Result<()>> {
        self.inner.move_file(from, to)
    }

    fn copy_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, strand_fs::Result<u64>> {
        self.inner.copy_file(from, to)
    }

    fn open_sequential_write<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, strand_fs::Result<WriteStream>> {
        self.inner.open_sequential_write(path)
    }

    fn free_space<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, strand_fs::Result<u64>> {
        async move { Ok(self.free.load(Ordering::SeqCst)) }.boxed()
    }
}

/// Counts sweeps and frees `gain` bytes on the [`SpaceFs`] each time.
pub struct CountingEvictor {
    fs: Arc<SpaceFs>,
    gain: AtomicU64,
    sweeps: AtomicUsize,
}

impl CountingEvictor {
    pub fn set_gain(&self, gain: u64) {
        self.gain.store(gain, Ordering::SeqCst);
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps.load(Ordering::SeqCst)
    }
}

impl CacheEvictor for CountingEvictor {
    fn evict(&self) -> BoxFuture<'_, ()> {
        async move {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            self.fs.add_free(self.gain.load(Ordering::SeqCst));
        }
        .boxed()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&TransferEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    pub fn notices(&self) -> Vec<strand_fetch::Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Notice { notice } => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self, id: &str) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransferEvent::Progress {
                    id: event_id,
                    chunks_done,
                    ..
                } if event_id == id => Some(chunks_done),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: TransferEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct RecordingMediaStore {
    entries: Mutex<Vec<MediaEntry>>,
}

impl RecordingMediaStore {
    pub fn entries(&self) -> Vec<MediaEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl MediaStore for RecordingMediaStore {
    fn insert<'a>(
        &'a self,
        path: &'a Path,
        name: &'a str,
        mime: &'a str,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        async move {
            let bytes = tokio::fs::read(path).await?;
            self.entries.lock().unwrap().push(MediaEntry {
                name: name.to_string(),
                mime: mime.to_string(),
                bytes,
            });
            Ok::<(), BoxError>(())
        }
        .boxed()
    }
}

#[derive(Default)]
pub struct RecordingIndex {
    ids: Mutex<Vec<String>>,
}

impl RecordingIndex {
    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().unwrap().clone()
    }
}

impl OfflineIndex for RecordingIndex {
    fn add<'a>(&'a self, descriptor: &'a FileDescriptor) -> BoxFuture<'a, Result<(), BoxError>> {
        async move {
            self.ids.lock().unwrap().push(descriptor.id.clone());
            Ok(())
        }
        .boxed()
    }
}

/// Offline index whose `add` parks until [`GatedIndex::open`] is called.
pub struct GatedIndex {
    entered: AtomicUsize,
    gate: watch::Sender<bool>,
    ids: Mutex<Vec<String>>,
}

impl Default for GatedIndex {
    fn default() -> Self {
        Self {
            entered: AtomicUsize::new(0),
            gate: watch::Sender::new(false),
            ids: Mutex::new(Vec::new()),
        }
    }
}

impl GatedIndex {
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().unwrap().clone()
    }
}

impl OfflineIndex for GatedIndex {
    fn add<'a>(&'a self, descriptor: &'a FileDescriptor) -> BoxFuture<'a, Result<(), BoxError>> {
        async move {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let mut gate = self.gate.subscribe();
            let _ = gate.wait_for(|open| *open).await;
            self.ids.lock().unwrap().push(descriptor.id.clone());
            Ok(())
        }
        .boxed()
    }
}

/// Engine wiring over a temp directory with fast retries and settle.
pub struct Harness {
    pub dir: TempDir,
    pub source: MockSource,
    pub fs: Arc<SpaceFs>,
    pub evictor: Arc<CountingEvictor>,
    pub events: Arc<RecordingSink>,
    pub index: Arc<RecordingIndex>,
}

impl Harness {
    pub fn new() -> Self {
        let fs = Arc::new(SpaceFs::new(64 * 1024 * MIB));
        Self {
            dir: tempfile::tempdir().unwrap(),
            source: MockSource::default(),
            evictor: Arc::new(CountingEvictor {
                fs: Arc::clone(&fs),
                gain: AtomicU64::new(0),
                sweeps: AtomicUsize::new(0),
            }),
            fs,
            events: Arc::new(RecordingSink::default()),
            index: Arc::new(RecordingIndex::default()),
        }
    }

    pub fn dirs(&self) -> DirConfig {
        DirConfig::under(self.dir.path())
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::default()
            .dirs(self.dirs())
            .retry_interval(Duration::from_millis(1))
            .settle_delay(Duration::from_millis(10))
    }

    pub fn builder(&self) -> EngineBuilder<MockSource, XorCipher> {
        Engine::builder(self.source.clone(), XorCipher)
            .config(self.config())
            .filesystem(self.fs.clone())
            .evictor(self.evictor.clone())
            .offline_index(self.index.clone())
            .events(self.events.clone())
    }

    pub fn engine(&self) -> Engine<MockSource, XorCipher> {
        self.builder().build().unwrap()
    }

    /// Registers a file of `size` bytes with the source and returns it.
    pub fn file(&self, id: &str, size: u64) -> (FileDescriptor, Vec<u8>) {
        let descriptor = descriptor(id, size);
        let plain = content(id, size);
        self.source.add_file(&descriptor, &plain);
        (descriptor, plain)
    }

    pub fn temp_path(&self, descriptor: &FileDescriptor) -> PathBuf {
        self.dirs().temp.join(temp_file_name(descriptor))
    }

    pub fn offline_path(&self, descriptor: &FileDescriptor) -> PathBuf {
        self.dirs().offline.join(format!("{}.bin", descriptor.id))
    }

    pub fn download_path(&self, descriptor: &FileDescriptor) -> PathBuf {
        self.dirs().download.join(&descriptor.name)
    }
}

/// Polls `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
