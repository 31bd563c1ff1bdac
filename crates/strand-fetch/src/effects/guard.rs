use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use strand_fs::Filesystem;
use tracing::{debug, info, warn};

use crate::core::required_bytes;
use crate::error::{Error, Result};

/// Best-effort cache eviction, run when free space is short.
///
/// Failures are the evictor's own business; the guard re-measures afterwards
/// either way.
pub trait CacheEvictor: Send + Sync {
    fn evict(&self) -> BoxFuture<'_, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoEviction;

impl CacheEvictor for NoEviction {
    fn evict(&self) -> BoxFuture<'_, ()> {
        async {}.boxed()
    }
}

/// Empties a fixed set of cache directories.
///
/// Must not include the transfer temp directory: in-flight temp files of
/// other transfers live there.
#[derive(Debug, Clone, Default)]
pub struct SweepDirectories {
    dirs: Vec<PathBuf>,
}

impl SweepDirectories {
    pub fn new(dirs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }
}

impl CacheEvictor for SweepDirectories {
    fn evict(&self) -> BoxFuture<'_, ()> {
        async move {
            for dir in &self.dirs {
                let mut entries = match tokio::fs::read_dir(dir).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "cannot read cache directory");
                        continue;
                    }
                };
                let mut removed = 0usize;
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(dir = %dir.display(), error = %e, "cache directory scan failed");
                            break;
                        }
                    };
                    let path = entry.path();
                    let result = match entry.file_type().await {
                        Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
                        _ => tokio::fs::remove_file(&path).await,
                    };
                    match result {
                        Ok(()) => removed += 1,
                        Err(e) => warn!(path = %path.display(), error = %e, "cache eviction failed"),
                    }
                }
                debug!(dir = %dir.display(), removed, "cache directory swept");
            }
        }
        .boxed()
    }
}

/// Free-space preflight run once per whole-file transfer.
pub struct DiskSpaceGuard {
    fs: Arc<dyn Filesystem>,
    evictor: Arc<dyn CacheEvictor>,
    probe: PathBuf,
    buffer: u64,
    settle: Duration,
}

impl std::fmt::Debug for DiskSpaceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskSpaceGuard")
            .field("probe", &self.probe)
            .field("buffer", &self.buffer)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl DiskSpaceGuard {
    /// `probe` is a path on the volume that receives temp files.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        evictor: Arc<dyn CacheEvictor>,
        probe: impl Into<PathBuf>,
        buffer: u64,
        settle: Duration,
    ) -> Self {
        Self {
            fs,
            evictor,
            probe: probe.into(),
            buffer,
            settle,
        }
    }

    /// Succeeds when at least `size` plus the buffer is free, sweeping the
    /// cache once if needed. Returns the free bytes last measured.
    pub async fn ensure(&self, size: u64) -> Result<u64> {
        let required = required_bytes(size, self.buffer);
        let available = self.fs.free_space(&self.probe).await?;
        if available >= required {
            return Ok(available);
        }

        info!(required, available, "low on space, evicting cache");
        self.evictor.evict().await;
        tokio::time::sleep(self.settle).await;

        let available = self.fs.free_space(&self.probe).await?;
        if available >= required {
            debug!(required, available, "eviction freed enough space");
            return Ok(available);
        }
        Err(Error::OutOfStorage {
            required,
            available,
        })
    }
}
