//! Chunked, decrypting file retrieval with ordered reassembly.
//!
//! A remote file is stored as fixed-size encrypted chunks. The [`Engine`]
//! fetches them concurrently, decrypts each one, commits them to a temp file
//! in strict index order and finally routes the file to a preview, the
//! offline cache or the user's downloads.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable descriptors, configuration, requests and events
//! - `core` - Pure scheduling: retry cadence, waves, paths, space arithmetic
//! - `effects` - I/O behind traits: chunk sources, sinks, limiters, engine
//!
//! # Concurrency
//!
//! Two independent limiters bound the work: whole-file transfers
//! ([`EngineConfig::max_concurrent_transfers`], previews exempt) and chunk
//! fetches across all transfers ([`EngineConfig::max_concurrent_chunks`]).
//! At most one transfer per file id runs at any time.
//!
//! # Example
//!
//! ```no_run
//! use strand_fetch::{Engine, FileDescriptor, HttpChunkSource, Plaintext, TransferRequest};
//!
//! # async fn run(descriptor: FileDescriptor) -> strand_fetch::Result<()> {
//! let source = HttpChunkSource::new("https://chunks.example.com")
//!     .map_err(|e| strand_fetch::Error::Config(e.to_string()))?;
//! let engine = Engine::builder(source, Plaintext).build()?;
//! let placement = engine.start(TransferRequest::download(descriptor)).await?;
//! println!("saved to {:?}", placement.path());
//! # Ok(())
//! # }
//! ```

mod core;
mod data;
mod effects;
mod error;

pub use crate::core::{RetryPolicy, file_extension, plan_waves, temp_file_name};
pub use data::{
    CHUNK_SIZE, ChannelSink, ChunkAddress, DestinationKind, DirConfig, EngineConfig, EventSink,
    FileDescriptor, NoopSink, Notice, Placement, RetryConfig, SpaceConfig, TransferEvent,
    TransferRequest, TransferSnapshot, TransferState,
};
pub use effects::{
    AssumeOnline, BoxError, CacheEvictor, ChunkFetcher, ChunkSource, Connectivity, Control,
    Decryptor, DirectoryLayout, DiskSpaceGuard, Engine, EngineBuilder, Limiter, LimiterPermit,
    MediaStore, NetworkMonitor, NoEviction, NoOfflineIndex, OfflineIndex, OrderedWriteSink,
    PathResolver, Placer, Plaintext, Registration, SweepDirectories, TransferHandle,
    TransferRecord, TransferRegistry,
};
pub use error::{Error, Result};

#[cfg(feature = "reqwest")]
pub use effects::HttpChunkSource;
