//! Background task orchestration around an external media-download engine.
//!
//! The library is split the way the work splits: `types` holds the data
//! carried between background tasks and their owner, `engine` defines the
//! seam to the external metadata/download engine (plus the yt-dlp adapter),
//! `tasks` holds the one-shot fetch and download operations, and `controller`
//! owns at most one running task of each kind and marshals results back to
//! the caller's context.

pub mod controller;
pub mod engine;
pub mod tasks;
pub mod types;
