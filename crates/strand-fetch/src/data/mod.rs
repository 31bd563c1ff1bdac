//! Data layer: immutable descriptors, configuration, requests and events.

pub mod config;
pub mod descriptor;
pub mod event;
pub mod request;

pub use config::{DirConfig, EngineConfig, RetryConfig, SpaceConfig};
pub use descriptor::{CHUNK_SIZE, ChunkAddress, FileDescriptor};
pub use event::{
    ChannelSink, EventSink, NoopSink, Notice, Placement, TransferEvent, TransferSnapshot,
    TransferState,
};
pub use request::{DestinationKind, TransferRequest};
