use crate::{Error, Result};
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    #[default]
    Copy,
    Error,
}

#[derive(Clone, Copy, Debug)]
pub struct MoveOptions {
    pub fallback: FallbackStrategy,
    pub replace: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            fallback: FallbackStrategy::Copy,
            replace: true,
        }
    }
}

impl MoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

fn crosses_devices(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18) || e.kind() == std::io::ErrorKind::CrossesDevices
}

/// Move `src` to `dest`, falling back to copy + remove when the two paths
/// live on different filesystems.
pub fn move_file(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: MoveOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if options.replace && dest.is_file() {
        std::fs::remove_file(dest).map_err(|e| Error::Remove {
            path: dest.to_path_buf(),
            source: e,
        })?;
    }

    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if crosses_devices(&e) && options.fallback == FallbackStrategy::Copy => {
            std::fs::copy(src, dest).map_err(|e| Error::Copy {
                from: src.to_path_buf(),
                to: dest.to_path_buf(),
                source: e,
            })?;
            std::fs::remove_file(src).map_err(|e| Error::Remove {
                path: src.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(Error::Move {
            from: src.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        }),
    }
}

pub fn copy_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    std::fs::copy(src, dest).map_err(|e| Error::Copy {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    })
}
