// Media backend trait definition

use std::path::Path;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::jobs::JobTable;
use super::models::{DownloadResult, Job, MediaInfo, OutputMode};

/// Capability shared by the external extractor and the in-process streamer
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Whether the backend can run at all right now
    async fn is_available(&self) -> bool {
        true
    }

    /// Whether this backend accepts the URL
    fn supports(&self, _url: &str) -> bool {
        true
    }

    /// Canonical form of the URL for this backend
    fn normalize_url(&self, url: &str) -> String {
        url.to_string()
    }

    /// Get media metadata without downloading
    async fn fetch_info(&self, url: &str) -> Result<MediaInfo, DownloadError>;

    /// Download into `dest_dir`, reporting progress as it goes
    async fn fetch_media(
        &self,
        url: &str,
        mode: &OutputMode,
        dest_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<DownloadResult, DownloadError>;
}

/// Writes `downloading` transitions for one job into the table
#[derive(Clone)]
pub struct ProgressReporter {
    table: JobTable,
    job: Job,
}

impl ProgressReporter {
    pub fn new(table: JobTable, job: Job) -> Self {
        Self { table, job }
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    pub async fn emit(&self, percent: u8, downloaded: Option<u64>, total: Option<u64>) {
        self.table
            .update(self.job.progressed(percent, downloaded, total))
            .await;
    }

    /// Byte-level progress; percent is derived when the total is known
    pub async fn emit_bytes(&self, downloaded: u64, total: Option<u64>) {
        let percent = match total {
            Some(t) if t > 0 => ((downloaded as f64 / t as f64) * 100.0).round().min(100.0) as u8,
            _ => 0,
        };
        self.emit(percent, Some(downloaded), total).await;
    }
}
