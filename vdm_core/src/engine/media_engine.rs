use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::types::{DownloadKind, SourceUrl};

/// Output filename template handed to the engine, relative to the resolved
/// destination directory.
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// What the engine reports for one source in "do not download" mode.
#[derive(Debug, Clone)]
pub struct MediaMetadata {
    pub title: String,
    /// True when the source is a multi-item collection (a playlist) rather
    /// than a single media item.
    pub is_collection: bool,
    pub renditions: Vec<Rendition>,
}

/// One raw quality/format variant as the engine reports it, before any
/// filtering or labelling.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub format_id: String,
    /// Quality label such as "720p". Audio-only renditions have none.
    pub quality_label: Option<String>,
    /// Container/extension such as "mp4".
    pub container: Option<String>,
    /// Exact or approximate size in bytes, when the engine knows it.
    pub size_bytes: Option<u64>,
}

/// Low-level callback payloads the engine emits while downloading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineProgress {
    Downloading {
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
    },
    Finished,
}

/// Return value of the progress hook: the engine must stop cooperatively as
/// soon as a callback answers `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    Continue,
    Stop,
}

/// How a download call ended when it did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    Completed,
    /// The hook asked the engine to stop mid-stream.
    Aborted,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine call failed: {0}")]
    Process(String),
    #[error("unexpected engine output: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Post-processing directives passed through to the engine after the raw
/// streams are on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Re-mux the merged streams into the given container with stream copy.
    RemuxVideo { container: String },
    /// Transcode the download to an audio file at a fixed bitrate.
    ExtractAudio { codec: String, bitrate_kbps: u32 },
    /// Embed the source thumbnail into the output, when one is available.
    EmbedThumbnail,
}

/// Options for one engine download call.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub format_selector: String,
    pub output_template: PathBuf,
    pub concurrent_fragments: u32,
    pub fragment_retries: u32,
    pub retries: u32,
    pub skip_unavailable_fragments: bool,
    pub postprocessors: Vec<PostProcessor>,
}

impl EngineOptions {
    /// Standard options for a download of the given kind.
    ///
    /// Video selects the chosen rendition plus the best audio track and
    /// re-muxes into mp4; audio selects the best audio track, transcodes to
    /// mp3 at 192 kbps and embeds the thumbnail.
    pub fn for_kind(kind: DownloadKind, format_id: Option<&str>, dest_dir: &Path) -> Self {
        let format_selector = match (kind, format_id) {
            (DownloadKind::Video, Some(id)) => format!("{id}+bestaudio/best"),
            _ => "bestaudio/best".to_string(),
        };
        let postprocessors = match kind {
            DownloadKind::Video => vec![PostProcessor::RemuxVideo { container: "mp4".into() }],
            DownloadKind::Audio => vec![
                PostProcessor::ExtractAudio { codec: "mp3".into(), bitrate_kbps: 192 },
                PostProcessor::EmbedThumbnail,
            ],
        };
        Self {
            format_selector,
            output_template: dest_dir.join(OUTPUT_TEMPLATE),
            concurrent_fragments: 4,
            fragment_retries: 10,
            retries: 3,
            skip_unavailable_fragments: true,
            postprocessors,
        }
    }
}

/// Callback invoked for every engine progress event. The engine must check
/// the returned signal at each invocation.
pub type ProgressHook<'a> = dyn Fn(EngineProgress) -> EngineSignal + Send + Sync + 'a;

/// The external metadata/download engine.
///
/// Both operations are treated as slow, fallible, blocking calls. They are
/// only ever invoked from a worker, never from the controller's own context.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Extracts metadata for a single source without downloading anything.
    async fn extract_metadata(&self, source: &SourceUrl) -> Result<MediaMetadata, EngineError>;

    /// Streams the source to disk, invoking `on_progress` for every engine
    /// callback. Returns `Aborted` when a callback answered `Stop`.
    async fn download(
        &self,
        source: &SourceUrl,
        options: &EngineOptions,
        on_progress: &ProgressHook<'_>,
    ) -> Result<EngineOutcome, EngineError>;
}
