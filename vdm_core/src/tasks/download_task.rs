use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::engine::media_engine::{
    EngineOptions, EngineOutcome, EngineProgress, EngineSignal, MediaEngine, OUTPUT_TEMPLATE,
};
use crate::types::types::{DownloadError, DownloadRequest, Phase, ProgressEvent};

/// One-shot download: drives a single engine download call, relays its
/// callbacks as `ProgressEvent`s, and honors cooperative cancellation.
///
/// Cancelling leaves any partially written output in place; nothing is rolled
/// back.
pub struct DownloadTask {
    request: DownloadRequest,
    options: EngineOptions,
}

impl DownloadTask {
    pub fn new(request: DownloadRequest) -> Self {
        let options =
            EngineOptions::for_kind(request.kind(), request.format_id(), request.dest_dir());
        Self { request, options }
    }

    /// Overrides the engine options (for testing/inspection).
    pub fn with_options(request: DownloadRequest, options: EngineOptions) -> Self {
        Self { request, options }
    }

    /// Runs the download to its terminal event.
    ///
    /// Exactly one terminal event (`Completed`, `Failed`, `Cancelled`) is
    /// emitted per call and nothing follows it. The returned `Result` mirrors
    /// the `Failed` terminal; completion and cancellation both return `Ok`.
    pub async fn run<E>(
        &self,
        engine: &E,
        on_event: &(dyn Fn(ProgressEvent) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError>
    where
        E: MediaEngine + ?Sized,
    {
        match self.execute(engine, on_event, cancel).await {
            Ok(EngineOutcome::Completed) => {
                on_event(ProgressEvent::Completed);
                Ok(())
            }
            Ok(EngineOutcome::Aborted) => {
                on_event(ProgressEvent::Cancelled);
                Ok(())
            }
            Err(reason) => {
                log::warn!("download of {} failed: {reason}", self.request.source());
                on_event(ProgressEvent::Failed { reason: reason.clone() });
                Err(reason)
            }
        }
    }

    async fn execute<E>(
        &self,
        engine: &E,
        on_event: &(dyn Fn(ProgressEvent) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<EngineOutcome, DownloadError>
    where
        E: MediaEngine + ?Sized,
    {
        if cancel.is_cancelled() {
            return Ok(EngineOutcome::Aborted);
        }

        on_event(ProgressEvent::Progress { fraction: 0.0, phase: Phase::Fetching });
        let metadata = engine
            .extract_metadata(self.request.source())
            .await
            .map_err(|e| DownloadError::NetworkOrExtraction(e.to_string()))?;

        let mut options = self.options.clone();
        if metadata.is_collection {
            // Collections land in a subdirectory named after the collection
            // title. Creation is idempotent; existing files are never touched.
            let dir = self
                .request
                .dest_dir()
                .join(sanitize_filename::sanitize(&metadata.title));
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| DownloadError::IoFailure(format!("{}: {e}", dir.display())))?;
            log::info!("collection \"{}\": downloading into {}", metadata.title, dir.display());
            options.output_template = dir.join(OUTPUT_TEMPLATE);
        }

        if cancel.is_cancelled() {
            return Ok(EngineOutcome::Aborted);
        }

        let has_postprocessing = !options.postprocessors.is_empty();
        let reached_full = AtomicBool::new(false);
        let hook = |progress: EngineProgress| -> EngineSignal {
            if cancel.is_cancelled() {
                return EngineSignal::Stop;
            }
            match progress {
                EngineProgress::Downloading { downloaded_bytes, total_bytes } => {
                    // Until a nonzero total is known the fraction stays at 0.
                    let fraction = match total_bytes {
                        Some(total) if total > 0 => {
                            (downloaded_bytes as f64 / total as f64).min(1.0)
                        }
                        _ => 0.0,
                    };
                    if fraction >= 1.0 {
                        reached_full.store(true, Ordering::Relaxed);
                    }
                    on_event(ProgressEvent::Progress { fraction, phase: Phase::Downloading });
                }
                EngineProgress::Finished => {
                    if !reached_full.swap(true, Ordering::Relaxed) {
                        on_event(ProgressEvent::Progress {
                            fraction: 1.0,
                            phase: Phase::Downloading,
                        });
                    }
                    if has_postprocessing {
                        on_event(ProgressEvent::PostProcessing { phase: Phase::Merging });
                    }
                }
            }
            EngineSignal::Continue
        };

        engine
            .download(self.request.source(), &options, &hook)
            .await
            .map_err(|e| DownloadError::NetworkOrExtraction(e.to_string()))
    }
}
