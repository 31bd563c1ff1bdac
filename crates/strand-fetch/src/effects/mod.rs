//! Effects layer: network, disk and task orchestration.
//!
//! Every collaborator with side effects sits behind a trait so that the
//! engine can be driven by in-memory doubles in tests.

mod chunk;
mod engine;
mod guard;
#[cfg(feature = "reqwest")]
mod http;
mod limiter;
mod placement;
mod platform;
mod registry;
mod sink;

pub use chunk::{ChunkFetcher, ChunkSource, Decryptor, Plaintext};
pub use engine::{Engine, EngineBuilder, TransferHandle};
pub use guard::{CacheEvictor, DiskSpaceGuard, NoEviction, SweepDirectories};
#[cfg(feature = "reqwest")]
pub use http::HttpChunkSource;
pub use limiter::{Limiter, LimiterPermit};
pub use placement::Placer;
pub use platform::{
    AssumeOnline, BoxError, Connectivity, DirectoryLayout, MediaStore, NetworkMonitor,
    NoOfflineIndex, OfflineIndex, PathResolver,
};
pub use registry::{Control, Registration, TransferRecord, TransferRegistry};
pub use sink::OrderedWriteSink;
