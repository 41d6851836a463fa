use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/api";

/// Client-side settings for talking to the fleet service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Fleet service root, including the `/api` prefix
    pub base_url: String,
    /// Period of the automatic fleet refresh (default: 30)
    pub poll_interval_seconds: u64,
    /// Upper bound for a single request (default: 10)
    pub request_timeout_seconds: u64,
    /// Where the session id is kept between runs (supports `~`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_seconds: 30,
            request_timeout_seconds: 10,
            session_file: None,
        }
    }
}

/// Per-user config directory, created on first use
pub fn config_dir() -> io::Result<PathBuf> {
    let pd = ProjectDirs::from("com", "example", "agrifleet")
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no config dir"))?;
    let dir = pd.config_dir();
    fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}

pub fn default_config_file() -> io::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::tilde(path).into_owned();
        let text = fs::read_to_string(&expanded)
            .with_context(|| format!("reading config file {}", expanded))?;
        let config: ClientConfig =
            toml::from_str(&text).with_context(|| format!("parsing config file {}", expanded))?;
        Ok(config)
    }

    /// Layer file, environment and command line, in that order of priority
    pub fn load(
        config_path: Option<&str>,
        base_url: Option<String>,
        poll_interval: Option<u64>,
        request_timeout: Option<u64>,
    ) -> anyhow::Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Ok(path) if path.exists() => Self::from_file(&path.to_string_lossy())?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        config.apply_args(base_url, poll_interval, request_timeout);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("AGRIFLEET_BASE_URL") {
            self.base_url = val;
        }
        if let Ok(val) = std::env::var("AGRIFLEET_POLL_INTERVAL") {
            if let Ok(parsed) = val.parse() {
                self.poll_interval_seconds = parsed;
            }
        }
        if let Ok(val) = std::env::var("AGRIFLEET_REQUEST_TIMEOUT") {
            if let Ok(parsed) = val.parse() {
                self.request_timeout_seconds = parsed;
            }
        }
        if let Ok(val) = std::env::var("AGRIFLEET_SESSION_FILE") {
            self.session_file = Some(val);
        }
    }

    fn apply_args(
        &mut self,
        base_url: Option<String>,
        poll_interval: Option<u64>,
        request_timeout: Option<u64>,
    ) {
        if let Some(val) = base_url {
            self.base_url = val;
        }
        if let Some(val) = poll_interval {
            self.poll_interval_seconds = val;
        }
        if let Some(val) = request_timeout {
            self.request_timeout_seconds = val;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_url.trim().is_empty() {
            anyhow::bail!("base_url must not be empty");
        }
        if self.poll_interval_seconds == 0 {
            anyhow::bail!("poll interval must be at least one second");
        }
        if self.request_timeout_seconds == 0 {
            anyhow::bail!("request timeout must be at least one second");
        }
        if self.request_timeout_seconds >= self.poll_interval_seconds {
            anyhow::bail!(
                "request timeout ({}s) must be shorter than the poll interval ({}s)",
                self.request_timeout_seconds,
                self.poll_interval_seconds
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Resolved session file path, defaulting to the per-user config dir
    pub fn session_path(&self) -> io::Result<PathBuf> {
        match &self.session_file {
            Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).into_owned())),
            None => Ok(config_dir()?.join("session_id")),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_args_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "base_url = \"http://fleet.local/api\"\npoll_interval_seconds = 60\n",
        )
        .unwrap();

        let mut config = ClientConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.base_url, "http://fleet.local/api");
        assert_eq!(config.poll_interval_seconds, 60);
        assert_eq!(config.request_timeout_seconds, 10);

        config.apply_args(None, Some(45), Some(5));
        assert_eq!(config.poll_interval_seconds, 45);
        assert_eq!(config.request_timeout_seconds, 5);
        assert_eq!(config.base_url, "http://fleet.local/api");
    }

    #[test]
    fn test_load_applies_timing_flags_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_seconds = 60\n").unwrap();
        let path = path.to_str().unwrap();

        let config = ClientConfig::load(Some(path), None, Some(20), Some(4)).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(20));
        assert_eq!(config.request_timeout(), Duration::from_secs(4));

        assert!(ClientConfig::load(Some(path), None, Some(5), Some(5)).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_timings() {
        let zero = ClientConfig {
            poll_interval_seconds: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let slow = ClientConfig {
            poll_interval_seconds: 10,
            request_timeout_seconds: 10,
            ..Default::default()
        };
        assert!(slow.validate().is_err());
    }

    #[test]
    fn test_save_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ClientConfig {
            session_file: Some("~/fleet-session".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = ClientConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_session_path_expands_tilde() {
        let config = ClientConfig {
            session_file: Some("~/fleet-session".to_string()),
            ..Default::default()
        };
        let path = config.session_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("fleet-session"));
    }
}
