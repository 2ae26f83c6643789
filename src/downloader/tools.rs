// Extractor discovery - yt-dlp binary or the python module

use std::process::Stdio;
use tokio::process::Command;

/// How to invoke the external extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorCommand {
    pub program: String,
    /// Arguments placed before the extractor's own flags (`-m yt_dlp`)
    pub prefix_args: Vec<String>,
}

impl ExtractorCommand {
    pub fn binary(program: &str) -> Self {
        Self {
            program: program.to_string(),
            prefix_args: Vec::new(),
        }
    }

    pub fn python_module(python: &str) -> Self {
        Self {
            program: python.to_string(),
            prefix_args: vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args);
        cmd
    }

    pub fn display(&self) -> String {
        if self.prefix_args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.prefix_args.join(" "))
        }
    }
}

/// Locates the yt-dlp extractor at call time
#[derive(Debug, Clone)]
pub struct ToolManager {
    ytdlp_bin: String,
    python_cmd: String,
}

impl ToolManager {
    pub fn new(ytdlp_bin: impl Into<String>, python_cmd: impl Into<String>) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            python_cmd: python_cmd.into(),
        }
    }

    /// `yt-dlp` directly, else `<python> -m yt_dlp`, else None
    pub async fn probe(&self) -> Option<ExtractorCommand> {
        if let Some(version) = Self::get_version(&self.ytdlp_bin, &[]).await {
            tracing::debug!("[tools] {} {}", self.ytdlp_bin, version);
            return Some(ExtractorCommand::binary(&self.ytdlp_bin));
        }

        if let Some(version) = Self::get_version(&self.python_cmd, &["-m", "yt_dlp"]).await {
            tracing::debug!("[tools] {} -m yt_dlp {}", self.python_cmd, version);
            return Some(ExtractorCommand::python_module(&self.python_cmd));
        }

        tracing::debug!(
            "[tools] neither {} nor {} -m yt_dlp is available",
            self.ytdlp_bin,
            self.python_cmd
        );
        None
    }

    async fn get_version(program: &str, prefix: &[&str]) -> Option<String> {
        let output = Command::new(program)
            .args(prefix)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Some(version)
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new("yt-dlp", "python")
    }
}
