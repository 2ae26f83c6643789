// External-process backend - runs `yt-dlp` (or `python -m yt_dlp`)
//
// The destination the tool prints is not authoritative (template expansion,
// extension negotiation), so after a successful run the result is re-resolved
// as the most recently modified file in the destination directory. Two jobs
// finishing into the same directory at the same moment can swap results.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::FormatSelector;
use crate::downloader::models::{DownloadResult, MediaFormat, MediaInfo, OutputMode};
use crate::downloader::tools::{ExtractorCommand, ToolManager};
use crate::downloader::traits::{MediaBackend, ProgressReporter};
use crate::downloader::utils;

pub const INSTALL_HINT: &str =
    "yt-dlp not found. Please install it with: pip install yt-dlp or python -m pip install yt-dlp";

/// One interesting line of `--newline` output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(f32),
    Destination(String),
}

/// Parse yt-dlp stdout lines like:
/// [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32
/// [download] Destination: /downloads/Title.mp4
pub fn parse_output_line(line: &str) -> Option<OutputLine> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").unwrap();
        static ref DEST_RE: Regex = Regex::new(r"\[download\] Destination: (.+)").unwrap();
        static ref MERGE_RE: Regex = Regex::new(r#"\[Merger\] Merging formats into "(.+)""#).unwrap();
        static ref ALREADY_RE: Regex = Regex::new(r"^\[download\] (.+) has already been downloaded").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        return Some(OutputLine::Progress(percent));
    }

    for re in [&*DEST_RE, &*MERGE_RE, &*ALREADY_RE] {
        if let Some(caps) = re.captures(line) {
            return Some(OutputLine::Destination(caps.get(1)?.as_str().trim().to_string()));
        }
    }

    None
}

/// yt-dlp based backend for every platform
pub struct YtDlpBackend {
    tools: ToolManager,
}

impl YtDlpBackend {
    pub fn new(tools: ToolManager) -> Self {
        Self { tools }
    }

    async fn extractor(&self) -> Result<ExtractorCommand, DownloadError> {
        self.tools
            .probe()
            .await
            .ok_or_else(|| DownloadError::ToolNotFound(INSTALL_HINT.to_string()))
    }

    /// Build download arguments (after the extractor prefix)
    pub fn build_download_args(url: &str, mode: &OutputMode, dest_dir: &Path) -> Vec<String> {
        let template = dest_dir.join("%(title)s.%(ext)s");
        vec![
            "-f".to_string(),
            FormatSelector::get_format_spec(mode),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            "--no-playlist".to_string(),
            "--no-mtime".to_string(),
            "--newline".to_string(),
            url.to_string(),
        ]
    }

    pub fn build_info_args(url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            url.to_string(),
        ]
    }

    /// Parse `--dump-json` output into MediaInfo
    pub fn parse_info(stdout: &[u8]) -> Result<MediaInfo, DownloadError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(json_str.trim())?;

        let empty = Vec::new();
        let formats_array = json["formats"].as_array().unwrap_or(&empty);

        let codec_present = |v: &serde_json::Value| v.as_str().map_or(false, |c| c != "none");

        let formats = formats_array
            .iter()
            .map(|f| MediaFormat {
                quality: f["format_note"]
                    .as_str()
                    .or_else(|| f["resolution"].as_str())
                    .map(str::to_string)
                    .or_else(|| f["height"].as_u64().map(|h| h.to_string())),
                container: f["ext"].as_str().map(str::to_string),
                has_video: codec_present(&f["vcodec"]),
                has_audio: codec_present(&f["acodec"]),
            })
            .collect();

        let video_labels = formats_array
            .iter()
            .filter(|f| codec_present(&f["vcodec"]))
            .filter_map(|f| {
                f["height"]
                    .as_u64()
                    .map(|h| format!("{}p", h))
                    .or_else(|| f["format_note"].as_str().map(str::to_string))
            });

        Ok(MediaInfo {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            duration: json["duration"].as_f64().map(|d| d.round() as u64),
            thumbnail: json["thumbnail"].as_str().map(str::to_string),
            view_count: json["view_count"].as_u64(),
            upload_date: json["upload_date"].as_str().map(utils::normalize_upload_date),
            formats,
            available_qualities: FormatSelector::available_qualities(video_labels),
        })
    }

    /// Run one download, streaming stdout for progress and the reported name
    async fn run_download(
        extractor: &ExtractorCommand,
        args: Vec<String>,
        progress: &ProgressReporter,
    ) -> Result<Option<String>, DownloadError> {
        tracing::info!(
            "[yt-dlp] job {}: {} {}",
            progress.job_id(),
            extractor.display(),
            args.join(" ")
        );

        let mut child = extractor
            .command()
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to start {}: {}", extractor.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        });

        let mut reported = None;
        let mut last_percent = 0u8;
        // yt-dlp prints titles in the locale encoding, so decode lossily
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("[yt-dlp] stopped reading stdout: {}", e);
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            match parse_output_line(line.trim_end()) {
                Some(OutputLine::Progress(p)) => {
                    let percent = p.floor().clamp(0.0, 100.0) as u8;
                    if percent != last_percent {
                        last_percent = percent;
                        progress.emit(percent, None, None).await;
                    }
                }
                Some(OutputLine::Destination(path)) => {
                    tracing::debug!("[yt-dlp] destination: {}", path);
                    reported = Some(utils::file_name_of(&path));
                }
                None => {}
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Process error: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(reported)
        } else {
            tracing::warn!("[yt-dlp] exited with {}: {}", status, stderr_output.trim());
            Err(DownloadError::from(last_lines(&stderr_output, 3)))
        }
    }

    /// Most recently modified file wins; the reported name is the fallback
    async fn resolve_result(dest_dir: &Path, reported: Option<String>) -> Result<DownloadResult, DownloadError> {
        if let Some((path, meta)) = utils::newest_file_in(dest_dir).await? {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            return Ok(DownloadResult {
                filename,
                path: path.to_string_lossy().to_string(),
                size: meta.len(),
            });
        }

        let filename = reported.unwrap_or_else(|| "download".to_string());
        let path = dest_dir.join(&filename);
        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        Ok(DownloadResult {
            filename,
            path: path.to_string_lossy().to_string(),
            size,
        })
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

impl Default for YtDlpBackend {
    fn default() -> Self {
        Self::new(ToolManager::default())
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn is_available(&self) -> bool {
        self.tools.probe().await.is_some()
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaInfo, DownloadError> {
        let extractor = self.extractor().await?;
        let output = extractor
            .command()
            .args(Self::build_info_args(url))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to start {}: {}", extractor.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::from(last_lines(&stderr, 3)));
        }

        Self::parse_info(&output.stdout)
    }

    async fn fetch_media(
        &self,
        url: &str,
        mode: &OutputMode,
        dest_dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<DownloadResult, DownloadError> {
        let extractor = self.extractor().await?;
        let dest_dir = utils::ensure_dir(dest_dir).await?;

        let args = Self::build_download_args(url, mode, &dest_dir);
        let reported = Self::run_download(&extractor, args, progress).await?;

        Self::resolve_result(&dest_dir, reported).await
    }
}
