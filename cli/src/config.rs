use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use trailwatch_daemon::DEFAULT_CHANNEL_CAPACITY;

pub const DEFAULT_DB_PATH: &str = "data/watcher_audit.db";
const CONFIG_FILE: &str = "config.toml";
const APP_DIR: &str = "trailwatch";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read config {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("debounce_secs must be a finite, non-negative number of seconds (got {0})")]
	Debounce(f64),
}

/// Defaults read from `config.toml`. Command-line flags override these.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
	pub db: PathBuf,
	pub debounce_secs: f64,
	pub hash: bool,
	pub recursive: bool,
	pub include_dirs: bool,
	pub ignore: Vec<String>,
	pub channel_capacity: usize,
	pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			db: PathBuf::from(DEFAULT_DB_PATH),
			debounce_secs: 1.0,
			hash: false,
			recursive: false,
			include_dirs: false,
			ignore: Vec::new(),
			channel_capacity: DEFAULT_CHANNEL_CAPACITY,
			log_dir: None,
		}
	}
}

impl Settings {
	/// Load from an explicit path, else the per-user config file if it exists,
	/// else built-in defaults. An explicit path must exist.
	pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
		match explicit {
			Some(path) => Self::from_file(path),
			None => match default_config_path() {
				Some(path) if path.is_file() => Self::from_file(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(&text).map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
	}

	fn parse(text: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(text)
	}

	pub fn debounce(&self) -> Result<Duration, ConfigError> {
		debounce_from_secs(self.debounce_secs)
	}

	/// Where the log file goes.
	pub fn log_dir(&self) -> PathBuf {
		self.log_dir.clone().unwrap_or_else(|| {
			dirs::data_local_dir()
				.unwrap_or_else(|| PathBuf::from("."))
				.join(APP_DIR)
		})
	}
}

pub fn debounce_from_secs(secs: f64) -> Result<Duration, ConfigError> {
	Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Debounce(secs))
}

fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}
