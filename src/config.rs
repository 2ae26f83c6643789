// Server configuration from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::downloader::backends::youtube::DEFAULT_API_BASE;
use crate::downloader::jobs::DEFAULT_RETENTION;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub settings_file: PathBuf,
    pub download_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub ytdlp_bin: String,
    pub python_cmd: String,
    pub retention: Duration,
    pub youtube_api: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            settings_file: PathBuf::from("settings.json"),
            download_dir: PathBuf::from("downloads"),
            static_dir: None,
            ytdlp_bin: "yt-dlp".to_string(),
            python_cmd: "python".to_string(),
            retention: DEFAULT_RETENTION,
            youtube_api: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", port))?;
        }
        if let Some(path) = get("DOWNLOADER_SETTINGS_FILE") {
            config.settings_file = PathBuf::from(path);
        }
        if let Some(path) = get("DOWNLOADER_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(path);
        }
        config.static_dir = get("DOWNLOADER_STATIC_DIR").map(PathBuf::from);
        if let Some(bin) = get("YTDLP_BIN") {
            config.ytdlp_bin = bin;
        }
        if let Some(python) = get("YTDLP_PYTHON") {
            config.python_cmd = python;
        }
        if let Some(secs) = get("DOWNLOADER_RETENTION_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("DOWNLOADER_RETENTION_SECS must be seconds, got {:?}", secs))?;
            config.retention = Duration::from_secs(secs);
        }
        if let Some(base) = get("DOWNLOADER_YOUTUBE_API") {
            config.youtube_api = base.trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:3000");
        assert_eq!(config.settings_file, PathBuf::from("settings.json"));
        assert_eq!(config.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.retention, Duration::from_secs(60));
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn overrides_from_env() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("HOST", "0.0.0.0"),
            ("YTDLP_PYTHON", "python3"),
            ("DOWNLOADER_RETENTION_SECS", "5"),
            ("DOWNLOADER_STATIC_DIR", "public"),
            ("DOWNLOADER_YOUTUBE_API", "http://localhost:9000/"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.python_cmd, "python3");
        assert_eq!(config.retention, Duration::from_secs(5));
        assert_eq!(config.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.youtube_api, "http://localhost:9000");
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(config_from(&[("PORT", "web")]).is_err());
        assert_eq!(config_from(&[("PORT", "")]).unwrap().port, 3000);
    }
}
