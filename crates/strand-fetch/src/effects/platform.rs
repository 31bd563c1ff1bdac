//! Capability seams for the host platform.
//!
//! The engine consumes these as trait objects so that a mobile shell, a
//! desktop app or a test can each plug in their own integration.

use std::path::{Path, PathBuf};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::core::{offline_file_name, sanitize_component, temp_file_name};
use crate::data::{DestinationKind, DirConfig, FileDescriptor};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Offline,
    Wifi,
    Cellular,
}

pub trait NetworkMonitor: Send + Sync {
    fn connectivity(&self) -> Connectivity;
}

/// Reports Wi-Fi unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl NetworkMonitor for AssumeOnline {
    fn connectivity(&self) -> Connectivity {
        Connectivity::Wifi
    }
}

impl<F> NetworkMonitor for F
where
    F: Fn() -> Connectivity + Send + Sync,
{
    fn connectivity(&self) -> Connectivity {
        self()
    }
}

/// Shared media collection (a phone's gallery or downloads provider).
///
/// `insert` copies the file in; the caller still owns and removes `path`.
pub trait MediaStore: Send + Sync {
    fn insert<'a>(
        &'a self,
        path: &'a Path,
        name: &'a str,
        mime: &'a str,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// Record of which items are available offline.
pub trait OfflineIndex: Send + Sync {
    fn add<'a>(&'a self, descriptor: &'a FileDescriptor) -> BoxFuture<'a, Result<(), BoxError>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOfflineIndex;

impl OfflineIndex for NoOfflineIndex {
    fn add<'a>(&'a self, _descriptor: &'a FileDescriptor) -> BoxFuture<'a, Result<(), BoxError>> {
        async { Ok(()) }.boxed()
    }
}

/// Maps a descriptor to its on-disk locations.
pub trait PathResolver: Send + Sync {
    fn temp_dir(&self) -> &Path;

    /// Final location for `kind`. Preview resolves to the temp path.
    fn destination(&self, descriptor: &FileDescriptor, kind: DestinationKind) -> PathBuf;

    fn temp_path(&self, descriptor: &FileDescriptor) -> PathBuf {
        self.temp_dir().join(temp_file_name(descriptor))
    }

    fn offline_path(&self, descriptor: &FileDescriptor) -> PathBuf {
        self.destination(descriptor, DestinationKind::OfflineCache)
    }
}

/// Fixed directory layout:
///
/// | kind         | path                          |
/// |--------------|-------------------------------|
/// | temp         | `temp/{name}_{id}.{ext}`      |
/// | offline      | `offline/{id}.{ext}`          |
/// | download     | `download/{name}`             |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    dirs: DirConfig,
}

impl DirectoryLayout {
    pub fn new(dirs: DirConfig) -> Self {
        Self { dirs }
    }

    pub fn dirs(&self) -> &DirConfig {
        &self.dirs
    }
}

impl PathResolver for DirectoryLayout {
    fn temp_dir(&self) -> &Path {
        &self.dirs.temp
    }

    fn destination(&self, descriptor: &FileDescriptor, kind: DestinationKind) -> PathBuf {
        match kind {
            DestinationKind::Preview => self.temp_path(descriptor),
            DestinationKind::OfflineCache => {
                self.dirs.offline.join(offline_file_name(descriptor))
            }
            DestinationKind::Download => {
                self.dirs.download.join(sanitize_component(&descriptor.name))
            }
        }
    }
}
