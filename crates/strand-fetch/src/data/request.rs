use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::descriptor::{CHUNK_SIZE, FileDescriptor};

/// Where a completed transfer ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    /// Ephemeral copy in the temp directory. Does not take a transfer slot.
    Preview,
    /// User-visible download location or the platform media store.
    #[default]
    Download,
    /// The offline cache, recorded in the offline index.
    OfflineCache,
}

impl DestinationKind {
    /// Whether this kind of transfer competes for a whole-file slot.
    pub fn needs_transfer_slot(self) -> bool {
        !matches!(self, DestinationKind::Preview)
    }
}

/// A request to fetch one file.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub descriptor: FileDescriptor,
    pub kind: DestinationKind,
    /// Refreshing an item that is already stored offline.
    pub offline_update: bool,
    /// Emit a success notice on completion.
    pub notify_on_success: bool,
    /// Serve Preview and Download requests from an existing offline copy.
    pub reuse_offline_copy: bool,
    /// Fetch at most this many leading chunks.
    pub max_chunks: Option<u64>,
    /// Overrides the derived temp path.
    pub temp_path: Option<PathBuf>,
}

impl TransferRequest {
    pub fn new(descriptor: FileDescriptor, kind: DestinationKind) -> Self {
        Self {
            descriptor,
            kind,
            offline_update: false,
            notify_on_success: false,
            reuse_offline_copy: true,
            max_chunks: None,
            temp_path: None,
        }
    }

    pub fn preview(descriptor: FileDescriptor) -> Self {
        Self::new(descriptor, DestinationKind::Preview)
    }

    pub fn download(descriptor: FileDescriptor) -> Self {
        Self::new(descriptor, DestinationKind::Download)
    }

    pub fn offline(descriptor: FileDescriptor) -> Self {
        Self::new(descriptor, DestinationKind::OfflineCache)
    }

    #[must_use]
    pub fn offline_update(mut self, update: bool) -> Self {
        self.offline_update = update;
        self
    }

    #[must_use]
    pub fn notify_on_success(mut self, notify: bool) -> Self {
        self.notify_on_success = notify;
        self
    }

    #[must_use]
    pub fn reuse_offline_copy(mut self, reuse: bool) -> Self {
        self.reuse_offline_copy = reuse;
        self
    }

    #[must_use]
    pub fn max_chunks(mut self, max: u64) -> Self {
        self.max_chunks = Some(max);
        self
    }

    #[must_use]
    pub fn temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_path = Some(path.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Chunks this transfer will fetch, after the `max_chunks` cap.
    pub fn chunks_to_fetch(&self) -> u64 {
        match self.max_chunks {
            Some(max) => max.min(self.descriptor.chunk_count),
            None => self.descriptor.chunk_count,
        }
    }

    /// Size the temp file will have once every fetched chunk is written.
    pub fn expected_bytes(&self) -> u64 {
        let chunks = self.chunks_to_fetch();
        if chunks < self.descriptor.chunk_count {
            chunks * CHUNK_SIZE
        } else {
            self.descriptor.size
        }
    }
}
