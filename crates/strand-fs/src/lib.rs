//! Filesystem capability interface for chunked transfers.
//!
//! The transfer engine never touches `std::fs` directly; it goes through the
//! [`Filesystem`] trait so that platform integrations (sandboxed mobile
//! storage, media stores, test doubles) can stand in for the local disk.
//! [`LocalFilesystem`] is the tokio-backed implementation.

mod error;
mod local;
pub mod primitives;

pub use error::{Error, Result};
pub use local::LocalFilesystem;
pub use primitives::{FallbackStrategy, MoveOptions, copy_file, move_file};

use std::path::Path;
use std::pin::Pin;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWrite;

/// A sequential, append-only byte stream opened on a destination file.
pub type WriteStream = Pin<Box<dyn AsyncWrite + Send>>;

/// Fallible filesystem operations consumed by the transfer engine.
///
/// Every method returns a typed [`Error`]; implementations must never panic
/// on I/O failures.
pub trait Filesystem: Send + Sync {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<bool>>;

    /// Size in bytes of the file at `path`.
    fn size<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<u64>>;

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<()>>;

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<()>>;

    /// Move `from` to `to`, replacing any file already at `to`.
    fn move_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<()>>;

    fn copy_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<u64>>;

    /// Create (or truncate) `path` and open it for sequential writes.
    fn open_sequential_write<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<WriteStream>>;

    /// Bytes available to the current user on the volume holding `path`.
    fn free_space<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<u64>>;
}
