pub mod types;

pub use types::{
    DownloadError, DownloadKind, DownloadRequest, FetchError, FormatOption, Phase, ProgressEvent,
    RequestError, SourceUrl, TaskKind, TaskState,
};
