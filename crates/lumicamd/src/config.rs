use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse upload config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("upload config missing required key: {0}")]
    Missing(&'static str),
}

/// Daemon configuration, loaded from `LUMICAM_*` environment variables.
pub struct Config {
    /// Target frames per second for the session driver.
    pub frame_rate: u32,
    /// Directory where captured PNGs are persisted.
    pub capture_dir: PathBuf,
    /// Remote analysis upload settings; `None` disables the upload sink.
    pub upload: Option<UploadConfig>,
}

/// Settings for the remote analysis sink.
///
/// Loaded from a TOML file (default `upload.toml` next to the capture
/// directory) with environment variables taking precedence, matching the
/// service this daemon feeds.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_upload_timeout() -> u64 {
    30
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("lumicam");

        let capture_dir = std::env::var("LUMICAM_CAPTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("captures"));

        let upload_file = std::env::var("LUMICAM_UPLOAD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("upload.toml"));

        Ok(Self {
            frame_rate: env_u32("LUMICAM_FRAME_RATE", 30),
            capture_dir,
            upload: UploadConfig::load(&upload_file)?,
        })
    }

    /// Driver tick interval derived from the frame rate, clamped to 1ms:
    /// a zero period would panic the driver's interval timer.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis((1000 / u64::from(self.frame_rate.max(1))).max(1))
    }
}

impl UploadConfig {
    /// Load from the TOML file if present, then apply environment overrides.
    ///
    /// Returns `Ok(None)` when neither the file nor the environment supplies
    /// any upload setting (upload sink disabled); a partially specified
    /// config is an error.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let mut endpoint = None;
        let mut api_key = None;
        let mut timeout_secs = None;

        if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let file: PartialUpload = toml::from_str(&text)?;
            endpoint = file.endpoint;
            api_key = file.api_key;
            timeout_secs = file.timeout_secs;
        }

        if let Ok(v) = std::env::var("LUMICAM_UPLOAD_ENDPOINT") {
            endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("LUMICAM_API_KEY") {
            api_key = Some(v);
        }
        if let Some(v) = env_parse::<u64>("LUMICAM_UPLOAD_TIMEOUT_SECS") {
            timeout_secs = Some(v);
        }

        match (endpoint, api_key) {
            (None, None) => Ok(None),
            (Some(endpoint), Some(api_key)) => Ok(Some(Self {
                endpoint,
                api_key,
                timeout_secs: timeout_secs.unwrap_or_else(default_upload_timeout),
            })),
            (None, Some(_)) => Err(ConfigError::Missing("endpoint")),
            (Some(_), None) => Err(ConfigError::Missing("api_key")),
        }
    }
}

/// File-side view of [`UploadConfig`] where every key is optional, so the
/// environment can fill the gaps.
#[derive(Deserialize)]
struct PartialUpload {
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_parse(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_upload_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "endpoint = \"https://analysis.example/upload\"\napi_key = \"sk-test\"\ntimeout_secs = 5"
        )
        .unwrap();

        let cfg = UploadConfig::load(file.path()).unwrap().expect("config");
        assert_eq!(cfg.endpoint, "https://analysis.example/upload");
        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn test_upload_config_default_timeout() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "endpoint = \"https://analysis.example/upload\"\napi_key = \"sk-test\""
        )
        .unwrap();

        let cfg = UploadConfig::load(file.path()).unwrap().expect("config");
        assert_eq!(cfg.timeout_secs, 30);
    }

    #[test]
    fn test_partial_upload_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"https://analysis.example/upload\"").unwrap();

        let result = UploadConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Missing("api_key"))));
    }

    #[test]
    fn test_absent_file_disables_upload() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = UploadConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert!(cfg.is_none());
    }

    #[test]
    fn test_frame_interval_never_zero() {
        let config = |frame_rate| Config {
            frame_rate,
            capture_dir: PathBuf::from("/tmp"),
            upload: None,
        };

        assert_eq!(config(30).frame_interval(), Duration::from_millis(33));
        // Rates above 1000 fps would truncate to a zero period and panic
        // the interval timer; clamp to 1ms instead.
        assert_eq!(config(2000).frame_interval(), Duration::from_millis(1));
        assert_eq!(config(u32::MAX).frame_interval(), Duration::from_millis(1));
        // A zero rate falls back to 1 fps rather than dividing by zero.
        assert_eq!(config(0).frame_interval(), Duration::from_secs(1));
    }
}
