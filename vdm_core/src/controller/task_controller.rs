use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::media_engine::MediaEngine;
use crate::tasks::{DownloadTask, FetchTask};
use crate::types::types::{
    DownloadKind, DownloadRequest, FetchError, FormatOption, ProgressEvent, RequestError,
    SourceUrl, TaskKind, TaskState,
};

/// Controller-wide settings fixed at construction.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Directory completed downloads are written into.
    pub dest_dir: PathBuf,
}

/// Format list retained from the last successful fetch, tied to the source it
/// was fetched for. A video download may only select from this list.
#[derive(Debug, Clone)]
pub struct HeldFormats {
    pub source: SourceUrl,
    pub options: Vec<FormatOption>,
}

impl HeldFormats {
    pub fn contains(&self, format_id: &str) -> bool {
        self.options.iter().any(|option| option.format_id == format_id)
    }
}

/// Events the controller surfaces to its caller, already marshalled onto the
/// caller's context. Poll or await them from the thread that owns the
/// controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// A fetch finished with at least one selectable rendition.
    FormatsReady {
        source: SourceUrl,
        formats: Vec<FormatOption>,
    },
    FetchFailed {
        reason: FetchError,
    },
    /// Progress or terminal event of the running download.
    Download(ProgressEvent),
}

/// What workers send back over the channel. Each message carries the run id
/// it belongs to so results from superseded runs can be dropped.
enum WorkerMsg {
    FetchDone {
        run: Uuid,
        source: SourceUrl,
        result: Result<Vec<FormatOption>, FetchError>,
    },
    Download {
        run: Uuid,
        event: ProgressEvent,
    },
}

/// Owns at most one fetch and one download at a time and serializes every
/// state change onto the caller's context.
///
/// Workers run on the tokio runtime and report back over an unbounded
/// channel; the controller's own state is only ever touched by the thread
/// that owns it, so no field needs a lock.
pub struct TaskController {
    engine: Arc<dyn MediaEngine>,
    config: ControllerConfig,
    fetch_state: TaskState,
    download_state: TaskState,
    fetch_run: Option<Uuid>,
    download_run: Option<Uuid>,
    formats: Option<HeldFormats>,
    cancel: Option<CancellationToken>,
    worker_tx: mpsc::UnboundedSender<WorkerMsg>,
    worker_rx: mpsc::UnboundedReceiver<WorkerMsg>,
    pending: VecDeque<ControllerEvent>,
}

impl TaskController {
    pub fn new(engine: Arc<dyn MediaEngine>, config: ControllerConfig) -> Self {
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            config,
            fetch_state: TaskState::Idle,
            download_state: TaskState::Idle,
            fetch_run: None,
            download_run: None,
            formats: None,
            cancel: None,
            worker_tx,
            worker_rx,
            pending: VecDeque::new(),
        }
    }

    /// Starts a metadata fetch for `raw`.
    ///
    /// Rejected synchronously while another fetch is running or when `raw` is
    /// not a recognized source. Starting a fetch for a new source drops any
    /// format list held for the previous one.
    pub fn request_fetch(&mut self, raw: &str) -> Result<(), RequestError> {
        self.absorb();
        if self.fetch_state.is_running() {
            return Err(RequestError::Busy(TaskKind::Fetch));
        }
        let task = FetchTask::from_raw(raw).map_err(|_| RequestError::InvalidSource)?;
        if self.formats.as_ref().is_some_and(|held| &held.source != task.source()) {
            self.formats = None;
        }

        let run = Uuid::new_v4();
        self.fetch_state = TaskState::Running;
        self.fetch_run = Some(run);
        log::info!("fetch {run}: {}", task.source());

        let engine = Arc::clone(&self.engine);
        let tx = self.worker_tx.clone();
        tokio::spawn(async move {
            let source = task.source().clone();
            let result = task.run(engine.as_ref()).await;
            let _ = tx.send(WorkerMsg::FetchDone { run, source, result });
        });
        Ok(())
    }

    /// Starts a download of `source` into `dest_dir`, or into the configured
    /// default directory when none is given.
    ///
    /// Rejected synchronously while another download is running. A video
    /// download additionally requires `format_id` to come from the format
    /// list held for this same source; audio needs no prior fetch.
    pub fn request_download(
        &mut self,
        source: &str,
        kind: DownloadKind,
        format_id: Option<String>,
        dest_dir: Option<PathBuf>,
    ) -> Result<(), RequestError> {
        self.absorb();
        if self.download_state.is_running() {
            return Err(RequestError::Busy(TaskKind::Download));
        }
        let source = SourceUrl::parse(source).map_err(|_| RequestError::InvalidSource)?;

        if kind == DownloadKind::Video {
            let held = self
                .formats
                .as_ref()
                .filter(|held| held.source == source)
                .ok_or_else(|| {
                    RequestError::InvalidRequest("no format list held for this source".into())
                })?;
            let id = format_id.as_deref().ok_or_else(|| {
                RequestError::InvalidRequest("video downloads need a selected format id".into())
            })?;
            if !held.contains(id) {
                return Err(RequestError::InvalidRequest(
                    "format id is not in the fetched list".into(),
                ));
            }
        }

        let dest_dir = dest_dir.unwrap_or_else(|| self.config.dest_dir.clone());
        let request = DownloadRequest::new(source, kind, format_id, dest_dir)
            .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;

        let run = Uuid::new_v4();
        let token = CancellationToken::new();
        self.download_state = TaskState::Running;
        self.download_run = Some(run);
        self.cancel = Some(token.clone());
        log::info!("download {run}: {} ({kind:?})", request.source());

        let engine = Arc::clone(&self.engine);
        let tx = self.worker_tx.clone();
        tokio::spawn(async move {
            let task = DownloadTask::new(request);
            let hook_tx = tx.clone();
            let hook = move |event: ProgressEvent| {
                let _ = hook_tx.send(WorkerMsg::Download { run, event });
            };
            // The terminal event already carries the failure; the Result is
            // redundant here.
            let _ = task.run(engine.as_ref(), &hook, &token).await;
        });
        Ok(())
    }

    /// Asks the running download to stop. Idempotent; a no-op when nothing is
    /// running. The `Cancelled` terminal arrives asynchronously.
    pub fn request_cancel(&mut self) {
        if let Some(token) = &self.cancel {
            log::info!("cancel requested");
            token.cancel();
        }
    }

    /// Drains every event that is ready without blocking.
    pub fn poll_events(&mut self) -> Vec<ControllerEvent> {
        self.absorb();
        self.pending.drain(..).collect()
    }

    /// Waits for the next event.
    pub async fn recv_event(&mut self) -> ControllerEvent {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return event;
            }
            // The controller holds a sender clone, so recv never sees a
            // closed channel.
            if let Some(msg) = self.worker_rx.recv().await {
                self.apply(msg);
            }
        }
    }

    pub fn fetch_state(&self) -> TaskState {
        self.fetch_state
    }

    pub fn download_state(&self) -> TaskState {
        self.download_state
    }

    /// The format list held from the last successful fetch (for inspection).
    pub fn held_formats(&self) -> Option<&HeldFormats> {
        self.formats.as_ref()
    }

    /// A clone of the running download's cancellation token, so callers can
    /// cancel from another task (a signal handler, say) without holding the
    /// controller.
    pub fn cancel_handle(&self) -> Option<CancellationToken> {
        self.cancel.clone()
    }

    fn absorb(&mut self) {
        while let Ok(msg) = self.worker_rx.try_recv() {
            self.apply(msg);
        }
    }

    fn apply(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::FetchDone { run, source, result } => {
                if self.fetch_run != Some(run) {
                    log::debug!("fetch {run}: dropping result of a superseded run");
                    return;
                }
                self.fetch_run = None;
                match result {
                    Ok(options) if options.is_empty() => {
                        self.fetch_state = TaskState::Failed;
                        self.formats = None;
                        self.pending.push_back(ControllerEvent::FetchFailed {
                            reason: FetchError::NoRenditions,
                        });
                    }
                    Ok(options) => {
                        self.fetch_state = TaskState::Succeeded;
                        self.formats =
                            Some(HeldFormats { source: source.clone(), options: options.clone() });
                        self.pending
                            .push_back(ControllerEvent::FormatsReady { source, formats: options });
                    }
                    Err(reason) => {
                        self.fetch_state = TaskState::Failed;
                        self.pending.push_back(ControllerEvent::FetchFailed { reason });
                    }
                }
            }
            WorkerMsg::Download { run, event } => {
                if self.download_run != Some(run) {
                    log::debug!("download {run}: dropping event of a superseded run");
                    return;
                }
                if event.is_terminal() {
                    self.download_state = match event {
                        ProgressEvent::Completed => TaskState::Succeeded,
                        ProgressEvent::Failed { .. } => TaskState::Failed,
                        _ => TaskState::Cancelled,
                    };
                    self.download_run = None;
                    self.cancel = None;
                }
                self.pending.push_back(ControllerEvent::Download(event));
            }
        }
    }
}
