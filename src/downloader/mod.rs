// Downloader module - job orchestration over pluggable media backends

pub mod backends;
pub mod errors;
pub mod format_selector;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod tools;
pub mod traits;
pub mod utils;

pub use errors::DownloadError;
pub use jobs::JobTable;
pub use models::{DownloadResult, Job, JobStatus, MediaFormat, MediaInfo, OutputMode};
pub use orchestrator::{plan_download, DownloadPlan, Downloader};
pub use platform::Platform;
pub use tools::{ExtractorCommand, ToolManager};
pub use traits::{MediaBackend, ProgressReporter};
