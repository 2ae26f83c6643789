// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested output for a download job
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Best stream, capped at 1080p for the external extractor
    #[default]
    Best,
    /// Audio-only stream
    Audio,
    /// Explicit quality label such as "720p"
    Quality(String),
}

impl OutputMode {
    /// Build a mode from the `format` / `quality` pair the HTTP API receives.
    /// An `audio` format wins over any quality; a blank quality means best.
    pub fn from_request(format: Option<&str>, quality: Option<&str>) -> Self {
        if format.map(str::trim) == Some("audio") {
            return Self::Audio;
        }

        match quality.map(str::trim) {
            Some(q) if !q.is_empty() => Self::Quality(q.to_string()),
            _ => Self::Best,
        }
    }

    /// Numeric height for a quality label ("720p" -> 720)
    pub fn height(&self) -> Option<u32> {
        match self {
            Self::Quality(label) => parse_leading_number(label),
            _ => None,
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Audio => write!(f, "audio"),
            Self::Quality(label) => write!(f, "{}", label),
        }
    }
}

impl Serialize for OutputMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Leading decimal digits of a label, parseInt-style ("1080p60" -> 1080)
pub fn parse_leading_number(label: &str) -> Option<u32> {
    let digits: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Downloading,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Final file produced by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub filename: String,
    pub path: String,
    pub size: u64,
}

/// Latest known state of one job. Replaced wholesale on every transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub url: String,
    pub mode: OutputMode,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(flatten)]
    pub result: Option<DownloadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn started(id: &str, url: &str, mode: &OutputMode) -> Self {
        Self {
            id: id.to_string(),
            url: url.to_string(),
            mode: mode.clone(),
            status: JobStatus::Downloading,
            progress: 0,
            downloaded: None,
            total: None,
            result: None,
            error: None,
        }
    }

    pub fn progressed(&self, progress: u8, downloaded: Option<u64>, total: Option<u64>) -> Self {
        Self {
            status: JobStatus::Downloading,
            progress: progress.min(100),
            downloaded,
            total,
            result: None,
            error: None,
            ..self.clone()
        }
    }

    pub fn completed(&self, result: DownloadResult) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: 100,
            downloaded: None,
            total: None,
            result: Some(result),
            error: None,
            ..self.clone()
        }
    }

    pub fn failed(&self, message: String) -> Self {
        Self {
            status: JobStatus::Error,
            downloaded: None,
            total: None,
            result: None,
            error: Some(message),
            ..self.clone()
        }
    }
}

/// One format entry of an info query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub quality: Option<String>,
    pub container: Option<String>,
    pub has_video: bool,
    pub has_audio: bool,
}

/// Metadata of a media URL, built fresh per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub title: String,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
    pub view_count: Option<u64>,
    pub upload_date: Option<String>,
    pub formats: Vec<MediaFormat>,
    pub available_qualities: Vec<String>,
}
