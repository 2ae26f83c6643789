// Orchestrator with fallback logic

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use super::errors::DownloadError;
use super::jobs::JobTable;
use super::models::{DownloadResult, Job, MediaInfo, OutputMode};
use super::platform::Platform;
use super::traits::{MediaBackend, ProgressReporter};
use crate::settings::SettingsStore;

const INSTALL_SUFFIX: &str = ". Install Python and yt-dlp for better compatibility.";

/// Which backends a download goes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPlan {
    InProcessOnly,
    ExternalThenInProcess,
    ExternalOnly,
}

/// `external_available` is only consulted for YouTube URLs.
pub fn plan_download(
    platform: Platform,
    external_available: bool,
    in_process_supports: bool,
) -> DownloadPlan {
    match platform {
        Platform::YouTube if !external_available && in_process_supports => {
            DownloadPlan::InProcessOnly
        }
        Platform::YouTube => DownloadPlan::ExternalThenInProcess,
        _ => DownloadPlan::ExternalOnly,
    }
}

/// Creates jobs, runs them in the background and answers status queries
#[derive(Clone)]
pub struct Downloader {
    external: Arc<dyn MediaBackend>,
    in_process: Arc<dyn MediaBackend>,
    jobs: JobTable,
    settings: SettingsStore,
}

impl Downloader {
    pub fn new(
        external: Arc<dyn MediaBackend>,
        in_process: Arc<dyn MediaBackend>,
        jobs: JobTable,
        settings: SettingsStore,
    ) -> Self {
        Self {
            external,
            in_process,
            jobs,
            settings,
        }
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub async fn external_available(&self) -> bool {
        self.external.is_available().await
    }

    /// Record a new job and start it. Returns the job id immediately.
    pub async fn submit(&self, url: &str, mode: OutputMode) -> Result<String, DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::InvalidUrl("URL is required".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DownloadError::InvalidUrl(
                "Only http and https URLs are supported".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let job = Job::started(&id, url, &mode);
        self.jobs.insert(job.clone()).await;
        tracing::info!("[downloader] job {} started for {} ({})", id, url, mode);

        let this = self.clone();
        tokio::spawn(async move { this.run(job).await });

        Ok(id)
    }

    pub async fn status(&self, id: &str) -> Option<Job> {
        self.jobs.get(id).await
    }

    pub async fn shutdown(&self) {
        self.jobs.shutdown().await;
    }

    async fn run(&self, job: Job) {
        let dest_dir = self.settings.download_dir().await;
        let reporter = ProgressReporter::new(self.jobs.clone(), job.clone());

        let finished = match self.execute(&job.url, &job.mode, &dest_dir, &reporter).await {
            Ok(result) => {
                tracing::info!("[downloader] job {} completed: {}", job.id, result.filename);
                job.completed(result)
            }
            Err(message) => {
                tracing::error!("[downloader] job {} failed: {}", job.id, message);
                job.failed(message)
            }
        };
        self.jobs.finish(finished).await;
    }

    async fn execute(
        &self,
        url: &str,
        mode: &OutputMode,
        dest_dir: &Path,
        reporter: &ProgressReporter,
    ) -> Result<DownloadResult, String> {
        let platform = Platform::detect(url);
        let normalized = self.in_process.normalize_url(url);
        let external_available = platform.is_youtube() && self.external.is_available().await;
        let plan = plan_download(
            platform,
            external_available,
            self.in_process.supports(&normalized),
        );
        tracing::debug!("[downloader] {} url, plan {:?}", platform, plan);

        match plan {
            DownloadPlan::InProcessOnly => {
                tracing::info!("[downloader] yt-dlp unavailable, using {}", self.in_process.name());
                self.in_process
                    .fetch_media(&normalized, mode, dest_dir, reporter)
                    .await
                    .map_err(|e| {
                        format!("YouTube download failed: {}{}", e.message(), INSTALL_SUFFIX)
                    })
            }
            DownloadPlan::ExternalThenInProcess => {
                match self.external.fetch_media(url, mode, dest_dir, reporter).await {
                    Ok(result) => Ok(result),
                    Err(e) if e.is_tool_not_found() => Err(e.message()),
                    Err(e) => {
                        tracing::warn!(
                            "[downloader] {} failed ({}), retrying with {}",
                            self.external.name(),
                            e,
                            self.in_process.name()
                        );
                        reporter.emit(0, None, None).await;
                        self.in_process
                            .fetch_media(&normalized, mode, dest_dir, reporter)
                            .await
                            .map_err(|e| format!("YouTube download failed: {}", e.message()))
                    }
                }
            }
            DownloadPlan::ExternalOnly => self
                .external
                .fetch_media(url, mode, dest_dir, reporter)
                .await
                .map_err(|e| {
                    if e.is_tool_not_found() {
                        e.message()
                    } else {
                        format!("Download failed: {}", e.message())
                    }
                }),
        }
    }

    /// Metadata for a URL without downloading it
    pub async fn info(&self, url: &str) -> Result<MediaInfo, DownloadError> {
        let platform = Platform::detect(url);
        let normalized = self.in_process.normalize_url(url);
        let mut in_process_error = None;

        if platform.is_youtube() && self.in_process.supports(&normalized) {
            match self.in_process.fetch_info(&normalized).await {
                Ok(info) => return Ok(info),
                Err(e) => {
                    tracing::warn!("[downloader] {} info failed: {}", self.in_process.name(), e);
                    in_process_error = Some(e);
                }
            }
        }

        if !self.external.is_available().await {
            return Err(match (platform, in_process_error) {
                (Platform::YouTube, Some(e)) => {
                    DownloadError::ToolNotFound(format!("{}{}", e.message(), INSTALL_SUFFIX))
                }
                (Platform::YouTube, None) => DownloadError::ToolNotFound(
                    "YouTube extraction failed. Please install Python and yt-dlp for better compatibility."
                        .to_string(),
                ),
                _ => DownloadError::ToolNotFound(
                    "yt-dlp not found. Please install it with: pip install yt-dlp".to_string(),
                ),
            });
        }

        self.external.fetch_info(url).await
    }
}
