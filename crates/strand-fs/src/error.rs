use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to remove '{path}': {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to move '{from}' to '{to}': {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to copy '{from}' to '{to}': {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to query free space for '{path}': {source}")]
    FreeSpace { path: PathBuf, source: io::Error },

    #[error("background filesystem task failed: {0}")]
    Task(String),
}

impl Error {
    /// The path the failing operation was addressed at, when there is one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Read { path, .. }
            | Error::Write { path, .. }
            | Error::Remove { path, .. }
            | Error::CreateDir { path, .. }
            | Error::FreeSpace { path, .. } => Some(path),
            Error::Move { to, .. } | Error::Copy { to, .. } => Some(to),
            Error::Task(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Read { source, .. }
            | Error::Write { source, .. }
            | Error::Remove { source, .. }
            | Error::CreateDir { source, .. }
            | Error::Move { source, .. }
            | Error::Copy { source, .. }
            | Error::FreeSpace { source, .. } => source.kind() == io::ErrorKind::NotFound,
            Error::Task(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
