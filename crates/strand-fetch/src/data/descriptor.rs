use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed plaintext size of every chunk except the last (1 MiB).
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Remote file as resolved by the metadata layer.
///
/// Immutable for the duration of a transfer. `chunk_count` must equal
/// `ceil(size / CHUNK_SIZE)`; see [`FileDescriptor::validate`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    pub region: String,
    pub bucket: String,
    pub size: u64,
    pub chunk_count: u64,
    pub name: String,
    pub mime: String,
    pub key: String,
    pub version: u32,
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("id", &self.id)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("size", &self.size)
            .field("chunk_count", &self.chunk_count)
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("key", &"<redacted>")
            .field("version", &self.version)
            .finish()
    }
}

impl FileDescriptor {
    /// Number of chunks a file of `size` bytes is split into.
    pub fn chunks_for(size: u64) -> u64 {
        size.div_ceil(CHUNK_SIZE)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDescriptor {
            id: self.id.clone(),
            reason,
        };

        if self.id.is_empty() {
            return Err(invalid("empty id".to_string()));
        }
        let expected = Self::chunks_for(self.size);
        if self.chunk_count != expected {
            return Err(invalid(format!(
                "{} bytes need {} chunks, descriptor lists {}",
                self.size, expected, self.chunk_count
            )));
        }
        Ok(())
    }

    pub fn chunk_address(&self, index: u64) -> ChunkAddress {
        ChunkAddress {
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            id: self.id.clone(),
            index,
        }
    }
}

/// Network address of one chunk: `region/bucket/id/index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkAddress {
    pub region: String,
    pub bucket: String,
    pub id: String,
    pub index: u64,
}

impl fmt::Display for ChunkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.region, self.bucket, self.id, self.index)
    }
}
