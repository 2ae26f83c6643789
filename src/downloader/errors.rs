// Error types for downloader backends

use std::fmt;

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// URL missing, malformed, or rejected by a backend's own pattern
    InvalidUrl(String),

    /// yt-dlp (binary or python module) not found in system
    ToolNotFound(String),

    /// Extractor process ran but exited unsuccessfully
    ExecutionError(String),

    /// Failed to parse extractor or player JSON output
    ParseError(String),

    /// No stream matched the requested mode
    NoSuitableFormat,

    /// HTTP request or stream failure
    Network(String),

    /// Destination write or directory scan failure
    Io(String),

    /// Unknown error with details
    Unknown(String),
}

impl DownloadError {
    /// Message without the variant prefix, as shown to the user in job records
    pub fn message(&self) -> String {
        match self {
            Self::InvalidUrl(msg)
            | Self::ToolNotFound(msg)
            | Self::ExecutionError(msg)
            | Self::ParseError(msg)
            | Self::Network(msg)
            | Self::Io(msg)
            | Self::Unknown(msg) => msg.clone(),
            Self::NoSuitableFormat => "No suitable format found".to_string(),
        }
    }

    pub fn is_tool_not_found(&self) -> bool {
        matches!(self, Self::ToolNotFound(_))
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::NoSuitableFormat => write!(f, "No suitable format found"),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
            Self::Unknown(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<serde_json::Error> for DownloadError {
    fn from(e: serde_json::Error) -> Self {
        Self::ParseError(format!("Invalid JSON: {}", e))
    }
}

// Classify raw extractor stderr. The process ran, so this is never ToolNotFound.
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        if s.contains("Unsupported URL") || s.contains("is not a valid URL") {
            return Self::InvalidUrl(s);
        }

        if s.contains("timed out") || s.contains("Unable to download") || s.contains("HTTP Error") {
            return Self::Network(s);
        }

        if s.trim().is_empty() {
            return Self::Unknown("extractor exited without output".to_string());
        }

        Self::ExecutionError(s)
    }
}
