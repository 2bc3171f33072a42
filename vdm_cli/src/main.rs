use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use vdm_core::controller::{ControllerConfig, ControllerEvent, TaskController};
use vdm_core::engine::YtDlpEngine;
use vdm_core::types::{DownloadKind, FormatOption, ProgressEvent};

mod progress_bar;
use progress_bar::DownloadBar;

#[derive(Parser)]
#[command(name = "vdm", about = "Video Download Manager")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the selectable formats of a video URL
    Formats {
        /// Video URL
        url: String,
    },
    /// Download a video as mp4
    Video {
        /// Video or playlist URL
        url: String,

        /// Format id to download (defaults to the highest resolution)
        #[arg(short, long)]
        format: Option<String>,

        /// Output directory (defaults to the system download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download the audio track as mp3
    Audio {
        /// Video or playlist URL
        url: String,

        /// Output directory (defaults to the system download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn dest_dir(output: Option<PathBuf>) -> PathBuf {
    output
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn controller(output: Option<PathBuf>) -> Result<TaskController, String> {
    let engine = YtDlpEngine::discover().map_err(|e| e.to_string())?;
    let config = ControllerConfig { dest_dir: dest_dir(output) };
    Ok(TaskController::new(Arc::new(engine), config))
}

/// Runs a fetch to completion and returns its format list.
async fn fetch_formats(
    controller: &mut TaskController,
    url: &str,
) -> Result<Vec<FormatOption>, String> {
    controller.request_fetch(url).map_err(|e| e.to_string())?;
    loop {
        match controller.recv_event().await {
            ControllerEvent::FormatsReady { formats, .. } => return Ok(formats),
            ControllerEvent::FetchFailed { reason } => return Err(reason.to_string()),
            ControllerEvent::Download(_) => {}
        }
    }
}

/// Drives a requested download to its terminal event, cancelling on Ctrl-C.
async fn run_download(controller: &mut TaskController) -> ExitCode {
    if let Some(cancel) = controller.cancel_handle() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let bar = DownloadBar::new();
    loop {
        let ControllerEvent::Download(event) = controller.recv_event().await else {
            continue;
        };
        bar.apply(&event);
        match event {
            ProgressEvent::Completed => return ExitCode::SUCCESS,
            ProgressEvent::Failed { .. } => return ExitCode::FAILURE,
            ProgressEvent::Cancelled => return ExitCode::from(130),
            _ => {}
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, String> {
    match args.command {
        Command::Formats { url } => {
            let mut controller = controller(None)?;
            for option in fetch_formats(&mut controller, &url).await? {
                println!("{:>8}  {}", option.format_id, option.label);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Video { url, format, output } => {
            let mut controller = controller(output)?;
            let formats = fetch_formats(&mut controller, &url).await?;
            let format_id = match format {
                Some(id) => id,
                // The list is sorted ascending by tier, so the last entry is
                // the highest resolution.
                None => match formats.last() {
                    Some(option) => option.format_id.clone(),
                    None => return Err("no selectable formats".to_string()),
                },
            };
            controller
                .request_download(&url, DownloadKind::Video, Some(format_id), None)
                .map_err(|e| e.to_string())?;
            Ok(run_download(&mut controller).await)
        }
        Command::Audio { url, output } => {
            let mut controller = controller(output)?;
            controller
                .request_download(&url, DownloadKind::Audio, None, None)
                .map_err(|e| e.to_string())?;
            Ok(run_download(&mut controller).await)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}
