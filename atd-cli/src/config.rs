use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use atd_engine::{DownloaderConfig, RemuxConfig};

use crate::error::{AppError, Result};

/// Settings read from `config.toml`. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub output_dir: Option<PathBuf>,
    /// Parallel segment downloads per item.
    pub segments: usize,
    /// Episodes downloaded at the same time.
    pub processes: usize,
    pub ffmpeg: bool,
    pub ffmpeg_path: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub proxy: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            segments: 16,
            processes: 1,
            ffmpeg: false,
            ffmpeg_path: None,
            user_agent: None,
            timeout_secs: None,
            retries: None,
            proxy: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("atd").join("config.toml"))
    }

    /// Load from `explicit`, or from the default location when it exists.
    ///
    /// An explicitly named file must exist; a missing default file just
    /// means built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => expand_tilde(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| AppError::Config {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|reason| AppError::Config { path, reason })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        if config.segments == 0 {
            return Err("`segments` must be at least 1".to_string());
        }
        if config.processes == 0 {
            return Err("`processes` must be at least 1".to_string());
        }
        Ok(config)
    }

    pub fn downloader_config(&self) -> DownloaderConfig {
        let mut config = DownloaderConfig::default();
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.as_str());
        }
        if let Some(secs) = self.timeout_secs {
            config.segment_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            config = config.with_max_retries(retries);
        }
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.as_str());
        }
        config
    }

    pub fn remux_config(&self) -> RemuxConfig {
        match &self.ffmpeg_path {
            Some(path) => RemuxConfig {
                ffmpeg_path: expand_tilde(Path::new(path)).to_string_lossy().into_owned(),
                ..RemuxConfig::default()
            },
            None => RemuxConfig::default(),
        }
    }

    /// Positional directory, else `output_dir`, else the current directory.
    pub fn output_dir(&self, from_cli: Option<&Path>) -> PathBuf {
        from_cli
            .or(self.output_dir.as_deref())
            .map(expand_tilde)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.segments, 16);
        assert_eq!(config.processes, 1);
        assert!(!config.ffmpeg);
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml(
            r#"
            output_dir = "/srv/cartoons"
            segments = 4
            processes = 3
            ffmpeg = true
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            user_agent = "atd/0.2"
            timeout_secs = 20
            retries = 5
            proxy = "http://127.0.0.1:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.segments, 4);
        assert_eq!(config.processes, 3);

        let http = config.downloader_config();
        assert_eq!(http.user_agent, "atd/0.2");
        assert_eq!(http.segment_timeout, Duration::from_secs(20));
        assert_eq!(http.retry.max_retries, 5);
        assert_eq!(http.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.remux_config().ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
    }

    #[rstest]
    #[case("segments = 0")]
    #[case("processes = 0")]
    #[case("unknown_key = 1")]
    #[case("segments = \"many\"")]
    fn test_invalid_files(#[case] content: &str) {
        assert!(AppConfig::from_toml(content).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "segments = 2\n").unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap().segments, 2);
    }

    #[test]
    fn test_output_dir_precedence() {
        let config = AppConfig {
            output_dir: Some(PathBuf::from("/from/config")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.output_dir(Some(Path::new("/from/cli"))),
            PathBuf::from("/from/cli")
        );
        assert_eq!(config.output_dir(None), PathBuf::from("/from/config"));
        assert_eq!(AppConfig::default().output_dir(None), PathBuf::from("."));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/Videos")), home.join("Videos"));
        }
        assert_eq!(expand_tilde(Path::new("/abs/~x")), PathBuf::from("/abs/~x"));
    }
}
