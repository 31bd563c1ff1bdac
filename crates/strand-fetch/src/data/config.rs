use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whole-file transfers admitted at once.
pub const MAX_CONCURRENT_TRANSFERS: usize = 3;
/// Chunk fetches in flight across all transfers; also the wave width.
pub const MAX_CONCURRENT_CHUNKS: usize = 32;
/// Free space kept on top of the file size for writes still landing.
pub const SPACE_BUFFER_BYTES: u64 = 256 * 1024 * 1024;
/// A temp file this close to the expected size is taken as complete.
pub const RESUME_TOLERANCE_BYTES: u64 = 128 * 1024;

/// Engine configuration.
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```
/// use strand_fetch::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(
///     r#"
///     max_concurrent_transfers = 2
///     [retry]
///     interval_ms = 250
///     "#,
/// )
/// .unwrap();
/// assert_eq!(config.max_concurrent_transfers, 2);
/// assert_eq!(config.max_concurrent_chunks, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrent_transfers: usize,
    pub max_concurrent_chunks: usize,
    pub retry: RetryConfig,
    pub space: SpaceConfig,
    pub resume_tolerance_bytes: u64,
    /// Refuse to start transfers unless the device is on Wi-Fi.
    pub wifi_only: bool,
    pub dirs: DirConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per chunk, the first one included.
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub buffer_bytes: u64,
    /// Wait after an eviction sweep before free space is queried again.
    pub settle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirConfig {
    pub temp: PathBuf,
    pub offline: PathBuf,
    pub download: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: MAX_CONCURRENT_TRANSFERS,
            max_concurrent_chunks: MAX_CONCURRENT_CHUNKS,
            retry: RetryConfig::default(),
            space: SpaceConfig::default(),
            resume_tolerance_bytes: RESUME_TOLERANCE_BYTES,
            wifi_only: false,
            dirs: DirConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1024,
            interval_ms: 1000,
            request_timeout_secs: 3600,
        }
    }
}

impl RetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: SPACE_BUFFER_BYTES,
            settle_ms: 5000,
        }
    }
}

impl SpaceConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for DirConfig {
    fn default() -> Self {
        Self::under(std::env::temp_dir().join("strand"))
    }
}

impl DirConfig {
    /// `temp`, `offline` and `downloads` directories below `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            temp: root.join("temp"),
            offline: root.join("offline"),
            download: root.join("downloads"),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_transfers == 0 {
            return Err(Error::Config("max_concurrent_transfers must be at least 1".into()));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(Error::Config("max_concurrent_chunks must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.request_timeout_secs == 0 {
            return Err(Error::Config("retry.request_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn max_concurrent_transfers(mut self, n: usize) -> Self {
        self.max_concurrent_transfers = n;
        self
    }

    #[must_use]
    pub fn max_concurrent_chunks(mut self, n: usize) -> Self {
        self.max_concurrent_chunks = n;
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry.interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.retry.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    #[must_use]
    pub fn space_buffer(mut self, bytes: u64) -> Self {
        self.space.buffer_bytes = bytes;
        self
    }

    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.space.settle_ms = delay.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn resume_tolerance(mut self, bytes: u64) -> Self {
        self.resume_tolerance_bytes = bytes;
        self
    }

    #[must_use]
    pub fn wifi_only(mut self, wifi_only: bool) -> Self {
        self.wifi_only = wifi_only;
        self
    }

    #[must_use]
    pub fn dirs(mut self, dirs: DirConfig) -> Self {
        self.dirs = dirs;
        self
    }
}
