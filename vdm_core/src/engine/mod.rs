pub mod media_engine;
pub mod ytdlp_engine;

pub use media_engine::{
    EngineError, EngineOptions, EngineOutcome, EngineProgress, EngineSignal, MediaEngine,
    MediaMetadata, PostProcessor, ProgressHook, Rendition,
};
pub use ytdlp_engine::YtDlpEngine;
