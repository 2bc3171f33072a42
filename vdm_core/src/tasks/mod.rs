pub mod download_task;
pub mod fetch_task;

pub use download_task::DownloadTask;
pub use fetch_task::{FetchTask, ALLOWED_TIERS};
