use indicatif::{ProgressBar, ProgressStyle};

use vdm_core::types::{Phase, ProgressEvent};

/// Renders download progress as a single indicatif terminal bar over 100
/// percentage points.
pub struct DownloadBar {
    bar: ProgressBar,
}

impl DownloadBar {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("[{bar:30.cyan/blue}] {percent:>3}% {msg}")
            .unwrap()
            .progress_chars("=>-");
        let bar = ProgressBar::new(100);
        bar.set_style(style);
        Self { bar }
    }

    pub fn apply(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Progress { fraction, phase } => {
                self.bar.set_position((fraction * 100.0).round() as u64);
                self.bar.set_message(phase_label(*phase));
            }
            ProgressEvent::PostProcessing { phase } => {
                self.bar.set_message(phase_label(*phase));
            }
            ProgressEvent::Completed => {
                self.bar.set_position(100);
                self.bar.finish_with_message("done");
            }
            ProgressEvent::Failed { reason } => {
                self.bar.abandon_with_message(format!("failed: {}", reason));
            }
            ProgressEvent::Cancelled => {
                self.bar.abandon_with_message("cancelled");
            }
        }
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Fetching => "fetching metadata",
        Phase::Downloading => "downloading",
        Phase::Merging => "post-processing",
    }
}
