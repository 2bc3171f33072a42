use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::engine::media_engine::{
    EngineError, EngineOptions, EngineOutcome, EngineProgress, EngineSignal, MediaEngine,
    MediaMetadata, PostProcessor, ProgressHook, Rendition,
};
use crate::types::types::SourceUrl;

/// Template handed to yt-dlp so every progress line on stdout is machine
/// readable: `VDM|<status>|<downloaded_bytes>|<total_or_estimate>`.
const PROGRESS_TEMPLATE: &str =
    "download:VDM|%(progress.status)s|%(progress.downloaded_bytes)d|%(progress.total_bytes,progress.total_bytes_estimate)d";

/// `MediaEngine` implementation that shells out to the yt-dlp binary.
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    /// Locates `yt-dlp` on PATH.
    pub fn discover() -> Result<Self, EngineError> {
        let binary = which::which("yt-dlp")
            .map_err(|e| EngineError::Process(format!("yt-dlp not found: {e}")))?;
        Ok(Self { binary })
    }

    /// Uses an explicit binary path instead of searching PATH.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }
}

/// Parses one stdout line produced under `PROGRESS_TEMPLATE`. Returns `None`
/// for anything that is not one of our progress lines.
pub fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let rest = line.trim().strip_prefix("VDM|")?;
    let mut fields = rest.split('|');
    match fields.next()? {
        "finished" => Some(EngineProgress::Finished),
        "downloading" => {
            let downloaded_bytes = fields.next()?.parse::<u64>().ok()?;
            // yt-dlp prints "NA" when neither total nor estimate is known
            let total_bytes = fields.next().and_then(|v| v.parse::<u64>().ok());
            Some(EngineProgress::Downloading { downloaded_bytes, total_bytes })
        }
        _ => None,
    }
}

/// Builds the yt-dlp argument list for one download call.
pub fn download_args(source: &SourceUrl, options: &EngineOptions) -> Vec<String> {
    let mut args = vec![
        "--newline".to_string(),
        "--no-warnings".to_string(),
        "--progress".to_string(),
        format!("--progress-template={PROGRESS_TEMPLATE}"),
        "-f".to_string(),
        options.format_selector.clone(),
        "-o".to_string(),
        options.output_template.to_string_lossy().into_owned(),
        "--concurrent-fragments".to_string(),
        options.concurrent_fragments.to_string(),
        "--fragment-retries".to_string(),
        options.fragment_retries.to_string(),
        "--retries".to_string(),
        options.retries.to_string(),
    ];
    if options.skip_unavailable_fragments {
        args.push("--skip-unavailable-fragments".to_string());
    }
    for postprocessor in &options.postprocessors {
        match postprocessor {
            PostProcessor::RemuxVideo { container } => {
                args.push("--merge-output-format".to_string());
                args.push(container.clone());
                args.push("--remux-video".to_string());
                args.push(container.clone());
            }
            PostProcessor::ExtractAudio { codec, bitrate_kbps } => {
                args.push("-x".to_string());
                args.push("--audio-format".to_string());
                args.push(codec.clone());
                args.push("--audio-quality".to_string());
                args.push(format!("{bitrate_kbps}K"));
            }
            PostProcessor::EmbedThumbnail => args.push("--embed-thumbnail".to_string()),
        }
    }
    args.push("--".to_string());
    args.push(source.as_str().to_string());
    args
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "_type", default)]
    entry_type: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    format_note: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    // yt-dlp emits these as integers or floats depending on the extractor
    #[serde(default)]
    filesize: Option<f64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
}

impl From<RawFormat> for Rendition {
    fn from(raw: RawFormat) -> Self {
        let size_bytes = raw
            .filesize
            .or(raw.filesize_approx)
            .filter(|size| *size > 0.0)
            .map(|size| size as u64);
        Rendition {
            format_id: raw.format_id,
            quality_label: raw.format_note,
            container: raw.ext,
            size_bytes,
        }
    }
}

/// Parses the JSON that `yt-dlp -J` writes for a single source.
pub fn parse_metadata_json(json: &str) -> Result<MediaMetadata, EngineError> {
    let raw: RawInfo = serde_json::from_str(json).map_err(|e| EngineError::Malformed(e.to_string()))?;
    Ok(MediaMetadata {
        title: raw.title.unwrap_or_else(|| "untitled".to_string()),
        is_collection: raw.entry_type.as_deref() == Some("playlist"),
        renditions: raw.formats.into_iter().map(Rendition::from).collect(),
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    match text.trim().rsplit('\n').next() {
        Some(line) if !line.trim().is_empty() => line.trim().to_string(),
        _ => "engine exited with an error".to_string(),
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    async fn extract_metadata(&self, source: &SourceUrl) -> Result<MediaMetadata, EngineError> {
        log::debug!("{} -J {source}", self.binary.display());
        let output = Command::new(&self.binary)
            .arg("-J")
            .arg("--flat-playlist")
            .arg("--no-warnings")
            .arg("--")
            .arg(source.as_str())
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(EngineError::Process(stderr_tail(&output.stderr)));
        }
        parse_metadata_json(&String::from_utf8_lossy(&output.stdout))
    }

    async fn download(
        &self,
        source: &SourceUrl,
        options: &EngineOptions,
        on_progress: &ProgressHook<'_>,
    ) -> Result<EngineOutcome, EngineError> {
        let args = download_args(source, options);
        log::debug!("{} {}", self.binary.display(), args.join(" "));
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Process("child stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        while let Some(line) = lines.next_line().await? {
            let Some(progress) = parse_progress_line(&line) else {
                continue;
            };
            if on_progress(progress) == EngineSignal::Stop {
                child.start_kill()?;
                let _ = child.wait().await;
                return Ok(EngineOutcome::Aborted);
            }
        }

        // stdout closed: the child is exiting. wait_with_output drains the
        // remaining stderr for diagnostics.
        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(EngineOutcome::Completed)
        } else {
            Err(EngineError::Process(stderr_tail(&output.stderr)))
        }
    }
}
