use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::request::DestinationKind;

/// Lifecycle states of an accepted transfer. Terminal outcomes are reported
/// as events, not states, because the record is gone by then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Queued,
    Admitted,
    Fetching,
    Finalizing,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Queued => write!(f, "Queued"),
            TransferState::Admitted => write!(f, "Admitted"),
            TransferState::Fetching => write!(f, "Fetching"),
            TransferState::Finalizing => write!(f, "Finalizing"),
        }
    }
}

/// Point-in-time view of one active transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSnapshot {
    pub id: String,
    pub name: String,
    pub kind: DestinationKind,
    pub state: TransferState,
    pub chunks_done: u64,
    pub chunk_count: u64,
    pub paused: bool,
}

/// Final location of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Placement {
    Preview(PathBuf),
    Offline(PathBuf),
    Download(PathBuf),
    /// Handed to the platform media store; no path is owned by us.
    MediaStore,
}

impl Placement {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Placement::Preview(p) | Placement::Offline(p) | Placement::Download(p) => Some(p),
            Placement::MediaStore => None,
        }
    }
}

/// User-facing message. `key` names the translation entry, `Display` gives
/// the English text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    AlreadyDownloading { name: String },
    DeviceOffline { name: String },
    WifiRequired { name: String },
    OutOfStorage { name: String },
    TransferFailed { name: String, reason: String },
    Downloaded { name: String },
    StoredOffline { name: String },
    OfflineUpdated { name: String },
}

impl Notice {
    pub fn key(&self) -> &'static str {
        match self {
            Notice::AlreadyDownloading { .. } => "fileDownloadAlreadyDownloadingFile",
            Notice::DeviceOffline { .. } => "deviceOffline",
            Notice::WifiRequired { .. } => "onlyWifiError",
            Notice::OutOfStorage { .. } => "deviceOutOfStorage",
            Notice::TransferFailed { .. } => "fileDownloadError",
            Notice::Downloaded { .. } => "fileDownloadDone",
            Notice::StoredOffline { .. } => "fileIsNowAvailableOffline",
            Notice::OfflineUpdated { .. } => "fileStoredOfflineUpdate",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Notice::AlreadyDownloading { name }
            | Notice::DeviceOffline { name }
            | Notice::WifiRequired { name }
            | Notice::OutOfStorage { name }
            | Notice::TransferFailed { name, .. }
            | Notice::Downloaded { name }
            | Notice::StoredOffline { name }
            | Notice::OfflineUpdated { name } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            Notice::Downloaded { .. } | Notice::StoredOffline { .. } | Notice::OfflineUpdated { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AlreadyDownloading { name } => write!(f, "{name} is already being downloaded"),
            Notice::DeviceOffline { name } => {
                write!(f, "Could not download {name}: the device is offline")
            }
            Notice::WifiRequired { name } => write!(
                f,
                "Could not download {name}: please enable Wi-Fi or change your settings"
            ),
            Notice::OutOfStorage { name } => {
                write!(f, "Could not download {name}: not enough storage on this device")
            }
            Notice::TransferFailed { name, reason } => write!(f, "{name} download failed: {reason}"),
            Notice::Downloaded { name } => write!(f, "{name} download done"),
            Notice::StoredOffline { name } => write!(f, "{name} is now available offline"),
            Notice::OfflineUpdated { name } => write!(f, "{name} offline copy updated"),
        }
    }
}

/// Events pushed to the UI layer. Fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    Progress {
        id: String,
        chunks_done: u64,
        chunk_count: u64,
    },
    StateChanged {
        id: String,
        state: TransferState,
    },
    Completed {
        id: String,
        placement: Placement,
    },
    Stopped {
        id: String,
    },
    Failed {
        id: String,
        name: String,
        reason: String,
    },
    MarkedOffline {
        id: String,
    },
    Notice {
        notice: Notice,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: TransferEvent);
}

impl<F> EventSink for F
where
    F: Fn(TransferEvent) + Send + Sync,
{
    fn emit(&self, event: TransferEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: TransferEvent) {}
}

/// Forwards events into an unbounded channel; a closed receiver drops them.
#[derive(Debug, Clone)]
pub struct ChannelSink(pub UnboundedSender<TransferEvent>);

impl EventSink for ChannelSink {
    fn emit(&self, event: TransferEvent) {
        let _ = self.0.send(event);
    }
}
