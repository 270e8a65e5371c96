use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::history::DEFAULT_CAPACITY;
use crate::processor::{DelayRange, Mode};
use crate::stats::DEFAULT_RECENT_WINDOW_SECS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_simulate_delay")]
    pub simulate_delay: bool,

    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,

    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_recent_window_seconds")]
    pub recent_window_seconds: u64,

    #[serde(default = "default_mode")]
    pub default_mode: Mode,

    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_simulate_delay() -> bool {
    true
}

fn default_delay_min_ms() -> u64 {
    500
}

fn default_delay_max_ms() -> u64 {
    1500
}

fn default_history_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_recent_window_seconds() -> u64 {
    DEFAULT_RECENT_WINDOW_SECS as u64
}

fn default_mode() -> Mode {
    Mode::Uppercase
}

fn default_preview_chars() -> usize {
    30
}

impl Default for Config {
    fn default() -> Self {
        Config {
            simulate_delay: default_simulate_delay(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            history_capacity: default_history_capacity(),
            recent_window_seconds: default_recent_window_seconds(),
            default_mode: default_mode(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Falls back to defaults on a parse error. A missing file is created
    /// with the defaults.
    pub fn load_from(path: &Path) -> Self {
        if let Ok(contents) = fs::read_to_string(path) {
            toml::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "error parsing config file, using defaults");
                Self::default()
            })
        } else {
            let default_config = Self::default();
            if let Err(e) = default_config.save_to(path) {
                warn!(path = %path.display(), error = %e, "error creating default config file");
            }
            default_config
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        Ok(())
    }

    pub fn delay(&self) -> DelayRange {
        if self.simulate_delay {
            DelayRange::new(self.delay_min_ms, self.delay_max_ms)
        } else {
            DelayRange::none()
        }
    }

    /// Values chrono cannot represent fall back to the default window.
    pub fn recent_window(&self) -> chrono::Duration {
        i64::try_from(self.recent_window_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| {
                warn!(
                    recent_window_seconds = self.recent_window_seconds,
                    "recent window out of range, using default"
                );
                chrono::Duration::seconds(DEFAULT_RECENT_WINDOW_SECS)
            })
    }

    pub fn config_dir() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("ratelimiter");
        path
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("delay_min_ms = 500"));
        assert!(written.contains("default_mode = \"uppercase\""));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "history_capacity = 10\ndefault_mode = \"word_frequency\"\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.history_capacity, 10);
        assert_eq!(config.default_mode, Mode::WordFrequency);
        assert_eq!(config.delay_max_ms, 1500);
        assert_eq!(config.preview_chars, 30);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "history_capacity = \"lots\"").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            simulate_delay: false,
            recent_window_seconds: 120,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn disabled_delay_yields_empty_range() {
        let config = Config {
            simulate_delay: false,
            ..Config::default()
        };
        assert_eq!(config.delay(), DelayRange::none());
        assert_eq!(Config::default().delay(), DelayRange::new(500, 1500));
        assert_eq!(Config::default().recent_window(), chrono::Duration::seconds(60));
    }

    #[test]
    fn oversized_recent_window_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "recent_window_seconds = 10000000000000000\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.recent_window_seconds, 10_000_000_000_000_000);
        assert_eq!(config.recent_window(), chrono::Duration::seconds(60));

        let config = Config {
            recent_window_seconds: u64::MAX,
            ..Config::default()
        };
        assert_eq!(config.recent_window(), chrono::Duration::seconds(60));

        let config = Config {
            recent_window_seconds: 3600,
            ..Config::default()
        };
        assert_eq!(config.recent_window(), chrono::Duration::seconds(3600));
    }
}
