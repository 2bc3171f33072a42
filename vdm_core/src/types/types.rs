use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Hosts a source descriptor may point at before it is handed to the engine.
const ACCEPTED_HOSTS: [&str; 4] = ["youtube.com", "www.youtube.com", "m.youtube.com", "youtu.be"];

/// A source descriptor that already passed the host-pattern check.
///
/// Construction is the validation point: every task and request type takes a
/// `SourceUrl`, so a malformed descriptor can never reach an engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl(String);

impl SourceUrl {
    /// Accepts `http(s)` URLs on a known video host and rejects everything
    /// else with `FetchError::InvalidSource`.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let trimmed = raw.trim();
        let parsed = Url::parse(trimmed).map_err(|_| FetchError::InvalidSource)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidSource);
        }
        match parsed.host_str() {
            Some(host) if ACCEPTED_HOSTS.contains(&host) => Ok(Self(trimmed.to_string())),
            _ => Err(FetchError::InvalidSource),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DownloadKind {
    Video,
    Audio,
}

/// One retrievable rendition, normalized for display and selection.
///
/// `label` is what a user sees; `format_id` is the opaque identifier the
/// download engine consumes later. `tier` is the numeric resolution bucket
/// (720 for "720p") the list is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub label: String,
    pub format_id: String,
    pub tier: u32,
}

/// Everything a DownloadTask needs, assembled by the controller immediately
/// before dispatch and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    source: SourceUrl,
    kind: DownloadKind,
    format_id: Option<String>,
    dest_dir: PathBuf,
}

impl DownloadRequest {
    /// A video request must carry a selected format id; an audio request
    /// ignores one if supplied.
    pub fn new(
        source: SourceUrl,
        kind: DownloadKind,
        format_id: Option<String>,
        dest_dir: PathBuf,
    ) -> Result<Self, DownloadError> {
        let format_id = match kind {
            DownloadKind::Video => Some(format_id.ok_or_else(|| {
                DownloadError::InvalidRequest("video downloads need a selected format id".into())
            })?),
            DownloadKind::Audio => None,
        };
        Ok(Self { source, kind, format_id, dest_dir })
    }

    pub fn source(&self) -> &SourceUrl {
        &self.source
    }

    pub fn kind(&self) -> DownloadKind {
        self.kind
    }

    pub fn format_id(&self) -> Option<&str> {
        self.format_id.as_deref()
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }
}

/// Stage of a download a progress event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Fetching,
    Downloading,
    Merging,
}

/// Events emitted by a running DownloadTask, in order. Exactly one terminal
/// event (`Completed`, `Failed`, `Cancelled`) ends every run; nothing follows
/// it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress { fraction: f64, phase: Phase },
    PostProcessing { phase: Phase },
    Completed,
    Failed { reason: DownloadError },
    Cancelled,
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Completed | ProgressEvent::Failed { .. } | ProgressEvent::Cancelled
        )
    }
}

/// Lifecycle of one task slot. Terminal states are absorbing; a new request
/// moves the slot back through `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskKind {
    Fetch,
    Download,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Fetch => f.write_str("fetch"),
            TaskKind::Download => f.write_str("download"),
        }
    }
}

/// Failures of a metadata-fetch run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not a recognized video URL")]
    InvalidSource,
    #[error("no renditions available for this source")]
    NoRenditions,
    #[error("failed to fetch media info: {0}")]
    NetworkOrExtraction(String),
}

/// Failures of a download run. Cancellation is not an error; it surfaces as
/// the distinct `ProgressEvent::Cancelled` terminal instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("invalid download request: {0}")]
    InvalidRequest(String),
    #[error("download failed: {0}")]
    NetworkOrExtraction(String),
    #[error("destination not writable: {0}")]
    IoFailure(String),
}

/// Rejections detected synchronously at request time, before any worker is
/// started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("a {0} task is already running")]
    Busy(TaskKind),
    #[error("not a recognized video URL")]
    InvalidSource,
    #[error("invalid download request: {0}")]
    InvalidRequest(String),
}
