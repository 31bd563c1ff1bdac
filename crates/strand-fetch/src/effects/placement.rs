use std::path::Path;
use std::sync::Arc;

use strand_fs::Filesystem;
use tracing::{debug, warn};

use super::platform::{MediaStore, OfflineIndex, PathResolver};
use crate::data::{DestinationKind, Placement, TransferRequest};
use crate::error::{Error, Result};

/// Routes finished temp files to their destination.
pub struct Placer {
    fs: Arc<dyn Filesystem>,
    paths: Arc<dyn PathResolver>,
    media_store: Option<Arc<dyn MediaStore>>,
    offline_index: Arc<dyn OfflineIndex>,
}

impl std::fmt::Debug for Placer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placer")
            .field("temp_dir", &self.paths.temp_dir())
            .field("media_store", &self.media_store.is_some())
            .finish_non_exhaustive()
    }
}

impl Placer {
    pub fn new(
        fs: Arc<dyn Filesystem>,
        paths: Arc<dyn PathResolver>,
        media_store: Option<Arc<dyn MediaStore>>,
        offline_index: Arc<dyn OfflineIndex>,
    ) -> Self {
        Self {
            fs,
            paths,
            media_store,
            offline_index,
        }
    }

    /// Moves the completed file at `temp` to where `request` wants it.
    pub async fn place(&self, request: &TransferRequest, temp: &Path) -> Result<Placement> {
        let descriptor = &request.descriptor;
        match request.kind {
            DestinationKind::Preview => Ok(Placement::Preview(temp.to_path_buf())),
            DestinationKind::OfflineCache => {
                let dest = self.paths.offline_path(descriptor);
                self.ensure_parent(&dest).await?;
                match self.fs.remove_file(&dest).await {
                    Ok(()) => debug!(id = %descriptor.id, path = %dest.display(), "replacing offline copy"),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => warn!(id = %descriptor.id, error = %e, "cannot remove old offline copy"),
                }
                self.fs.move_file(temp, &dest).await?;
                self.offline_index
                    .add(descriptor)
                    .await
                    .map_err(|e| Error::Placement {
                        reason: format!("offline index: {e}"),
                    })?;
                Ok(Placement::Offline(dest))
            }
            DestinationKind::Download => {
                if let Some(store) = &self.media_store {
                    self.insert_into(store.as_ref(), request, temp).await?;
                    if let Err(e) = self.fs.remove_file(temp).await {
                        warn!(id = %descriptor.id, error = %e, "temp file left after media store insert");
                    }
                    return Ok(Placement::MediaStore);
                }
                let dest = self.paths.destination(descriptor, DestinationKind::Download);
                self.ensure_parent(&dest).await?;
                self.fs.move_file(temp, &dest).await?;
                Ok(Placement::Download(dest))
            }
        }
    }

    /// Serves Preview and Download requests from an existing offline copy.
    ///
    /// Returns `None` when there is no copy to reuse. The offline file itself
    /// is never moved.
    pub async fn reuse_offline(&self, request: &TransferRequest) -> Result<Option<Placement>> {
        if !request.reuse_offline_copy || request.kind == DestinationKind::OfflineCache {
            return Ok(None);
        }
        let offline = self.paths.offline_path(&request.descriptor);
        if !self.fs.exists(&offline).await? {
            return Ok(None);
        }

        let placement = match request.kind {
            DestinationKind::Preview => Placement::Preview(offline),
            _ => match &self.media_store {
                Some(store) => {
                    self.insert_into(store.as_ref(), request, &offline).await?;
                    Placement::MediaStore
                }
                None => {
                    let dest = self
                        .paths
                        .destination(&request.descriptor, DestinationKind::Download);
                    self.ensure_parent(&dest).await?;
                    self.fs.copy_file(&offline, &dest).await?;
                    Placement::Download(dest)
                }
            },
        };
        Ok(Some(placement))
    }

    async fn insert_into(
        &self,
        store: &dyn MediaStore,
        request: &TransferRequest,
        path: &Path,
    ) -> Result<()> {
        let descriptor = &request.descriptor;
        store
            .insert(path, &descriptor.name, &descriptor.mime)
            .await
            .map_err(|e| Error::Placement {
                reason: format!("media store: {e}"),
            })
    }

    async fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        Ok(())
    }
}
