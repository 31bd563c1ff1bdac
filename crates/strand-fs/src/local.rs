use std::path::{Path, PathBuf};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::io::BufWriter;

use crate::primitives::{self, MoveOptions};
use crate::{Error, Filesystem, Result, WriteStream};

/// Buffer in front of sequential write streams (2 MiB), two chunks' worth.
const WRITE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// [`Filesystem`] backed by the local disk through `tokio::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFilesystem {
    move_options: MoveOptions,
}

impl LocalFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_move_options(mut self, options: MoveOptions) -> Self {
        self.move_options = options;
        self
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Task(e.to_string()))?
}

impl Filesystem for LocalFilesystem {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<bool>> {
        async move {
            tokio::fs::try_exists(path).await.map_err(|e| Error::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
        .boxed()
    }

    fn size<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<u64>> {
        async move {
            tokio::fs::metadata(path)
                .await
                .map(|m| m.len())
                .map_err(|e| Error::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
        }
        .boxed()
    }

    fn create_dir_all<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<()>> {
        async move {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| Error::CreateDir {
                    path: path.to_path_buf(),
                    source: e,
                })
        }
        .boxed()
    }

    fn remove_file<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<()>> {
        async move {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| Error::Remove {
                    path: path.to_path_buf(),
                    source: e,
                })
        }
        .boxed()
    }

    fn move_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<()>> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        let options = self.move_options;
        async move {
            tracing::debug!(from = %from.display(), to = %to.display(), "moving file");
            blocking(move || primitives::move_file(&from, &to, options)).await
        }
        .boxed()
    }

    fn copy_file<'a>(&'a self, from: &'a Path, to: &'a Path) -> BoxFuture<'a, Result<u64>> {
        let from = from.to_path_buf();
        let to = to.to_path_buf();
        async move { blocking(move || primitives::copy_file(&from, &to)).await }.boxed()
    }

    fn open_sequential_write<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<WriteStream>> {
        async move {
            let file = tokio::fs::File::create(path)
                .await
                .map_err(|e| Error::Write {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            let stream: WriteStream = Box::pin(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
            Ok(stream)
        }
        .boxed()
    }

    fn free_space<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<u64>> {
        let path: PathBuf = path.to_path_buf();
        async move {
            blocking(move || {
                fs2::available_space(&path).map_err(|e| Error::FreeSpace { path, source: e })
            })
            .await
        }
        .boxed()
    }
}
