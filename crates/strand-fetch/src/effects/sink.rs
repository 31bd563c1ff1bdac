use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use strand_fs::{Filesystem, WriteStream};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, watch};
use tracing::{error, trace};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    next: u64,
    poisoned: bool,
}

/// Append-only writer that commits chunks strictly in index order.
///
/// Chunks may arrive in any order; each [`submit`](Self::submit) waits until
/// every lower index has been written. After a write error the sink is
/// poisoned and every pending and later submission fails.
pub struct OrderedWriteSink {
    path: PathBuf,
    stream: Mutex<Option<WriteStream>>,
    cursor: watch::Sender<Cursor>,
    bytes_written: AtomicU64,
}

impl std::fmt::Debug for OrderedWriteSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cursor = *self.cursor.borrow();
        f.debug_struct("OrderedWriteSink")
            .field("path", &self.path)
            .field("next", &cursor.next)
            .field("poisoned", &cursor.poisoned)
            .field("bytes_written", &self.bytes_written.load(Ordering::Relaxed))
            .finish()
    }
}

impl OrderedWriteSink {
    /// Creates (or truncates) `path` and opens it for ordered writes.
    pub async fn open(fs: &dyn Filesystem, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stream = fs.open_sequential_write(&path).await?;
        Ok(Self {
            path,
            stream: Mutex::new(Some(stream)),
            cursor: watch::Sender::new(Cursor::default()),
            bytes_written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index the next committed chunk must have.
    pub fn next_index(&self) -> u64 {
        self.cursor.borrow().next
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    /// Writes chunk `index` once all chunks before it are written.
    ///
    /// Returns the new cursor position.
    pub async fn submit(&self, index: u64, data: Bytes) -> Result<u64> {
        let mut rx = self.cursor.subscribe();
        let cursor = *rx
            .wait_for(|c| c.poisoned || c.next >= index)
            .await
            .map_err(|_| Error::Shutdown)?;
        self.check(cursor, index)?;

        let mut guard = self.stream.lock().await;
        // recheck: a duplicate index may have been committed while we queued
        self.check(*self.cursor.borrow(), index)?;
        let Some(stream) = guard.as_mut() else {
            return Err(self.poisoned());
        };

        if let Err(source) = stream.write_all(&data).await {
            error!(path = %self.path.display(), index, error = %source, "chunk write failed");
            *guard = None;
            self.cursor.send_modify(|c| c.poisoned = true);
            return Err(strand_fs::Error::Write {
                path: self.path.clone(),
                source,
            }
            .into());
        }

        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::AcqRel);
        let mut next = index;
        self.cursor.send_modify(|c| {
            c.next += 1;
            next = c.next;
        });
        trace!(path = %self.path.display(), index, bytes = data.len(), "chunk committed");
        Ok(next)
    }

    /// Flushes and closes the stream. Returns the total bytes written.
    pub async fn finish(&self) -> Result<u64> {
        let mut guard = self.stream.lock().await;
        let Some(mut stream) = guard.take() else {
            return Err(self.poisoned());
        };
        let closed = async {
            stream.flush().await?;
            stream.shutdown().await
        };
        if let Err(source) = closed.await {
            self.cursor.send_modify(|c| c.poisoned = true);
            return Err(strand_fs::Error::Write {
                path: self.path.clone(),
                source,
            }
            .into());
        }
        Ok(self.bytes_written())
    }

    fn check(&self, cursor: Cursor, index: u64) -> Result<()> {
        if cursor.poisoned {
            return Err(self.poisoned());
        }
        if cursor.next != index {
            return Err(Error::ChunkOutOfOrder {
                index,
                expected: cursor.next,
            });
        }
        Ok(())
    }

    fn poisoned(&self) -> Error {
        Error::SinkPoisoned {
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use futures_util::FutureExt;
    use futures_util::future::BoxFuture;
    use strand_fs::LocalFilesystem;
    use tokio::io::AsyncWrite;

    #[tokio::test]
    async fn test_out_of_order_submissions_land_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let sink = Arc::new(OrderedWriteSink::open(&LocalFilesystem::new(), &path).await.unwrap());

        let order = [3u64, 0, 4, 2, 1];
        let mut handles = Vec::new();
        for index in order {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                let data = Bytes::from(vec![b'a' + index as u8; 3]);
                sink.submit(index, data).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(sink.finish().await.unwrap(), 15);
        assert_eq!(std::fs::read(&path).unwrap(), b"aaabbbcccdddeee");
    }

    #[tokio::test]
    async fn test_duplicate_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OrderedWriteSink::open(&LocalFilesystem::new(), dir.path().join("f"))
            .await
            .unwrap();
        sink.submit(0, Bytes::from_static(b"x")).await.unwrap();
        let err = sink.submit(0, Bytes::from_static(b"y")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ChunkOutOfOrder {
                index: 0,
                expected: 1
            }
        ));
        assert_eq!(sink.next_index(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_finishes_with_zero_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        let sink = OrderedWriteSink::open(&LocalFilesystem::new(), &path).await.unwrap();
        assert_eq!(sink.finish().await.unwrap(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    struct Broken;

    impl AsyncWrite for Broken {
        fn poll_write(
            self: Pin<&mut Self>,
            _: &mut Context<'_>,
            _: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::other("disk gone")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct BrokenFs;

    impl Filesystem for BrokenFs {
        fn exists<'a>(&'a self, _: &'a Path) -> BoxFuture<'a, strand_fs::Result<bool>> {
            async { Ok(false) }.boxed()
        }
        fn size<'a>(&'a self, _: &'a Path) -> BoxFuture<'a, strand_fs::Result<u64>> {
            async { Ok(0) }.boxed()
        }
        fn create_dir_all<'a>(&'a self, _: &'a Path) -> BoxFuture<'a, strand_fs::Result<()>> {
            async { Ok(()) }.boxed()
        }
        fn remove_file<'a>(&'a self, _: &'a Path) -> BoxFuture<'a, strand_fs::Result<()>> {
            async { Ok(()) }.boxed()
        }
        fn move_file<'a>(
            &'a self,
            _: &'a Path,
            _: &'a Path,
        ) -> BoxFuture<'a, strand_fs::Result<()>> {
            async { Ok(()) }.boxed()
        }
        fn copy_file<'a>(
            &'a self,
            _: &'a Path,
            _: &'a Path,
        ) -> BoxFuture<'a, strand_fs::Result<u64>> {
            async { Ok(0) }.boxed()
        }
        fn open_sequential_write<'a>(
            &'a self,
            _: &'a Path,
        ) -> BoxFuture<'a, strand_fs::Result<WriteStream>> {
            async { Ok(Box::pin(Broken) as WriteStream) }.boxed()
        }
        fn free_space<'a>(&'a self, _: &'a Path) -> BoxFuture<'a, strand_fs::Result<u64>> {
            async { Ok(u64::MAX) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_write_failure_poisons_waiters() {
        let sink = Arc::new(OrderedWriteSink::open(&BrokenFs, "/broken").await.unwrap());

        let waiter = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sink.submit(1, Bytes::from_static(b"b")).await })
        };
        tokio::task::yield_now().await;

        let err = sink.submit(0, Bytes::from_static(b"a")).await.unwrap_err();
        assert!(matches!(err, Error::FilesystemFailure(_)));
        assert!(matches!(
            waiter.await.unwrap(),
            Err(Error::SinkPoisoned { .. })
        ));
        assert!(matches!(sink.finish().await, Err(Error::SinkPoisoned { .. })));
    }
}
