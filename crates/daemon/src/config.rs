//! Daemon configuration file.
//!
//! The file is TOML. Every field has a default, so an empty or missing file
//! yields [`DaemonConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use confd_store::{DatabaseConfig, RegistryConfig};
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("failed to parse {path}: {error}")]
	Parse {
		/// Path to the file that failed to parse.
		path: PathBuf,
		/// The underlying TOML error.
		error: toml::de::Error,
	},

	/// A field holds a value outside its valid range.
	#[error("invalid configuration: {0}")]
	Invalid(String),

	/// A source path file includes itself, directly or indirectly.
	#[error("include cycle through {0}")]
	IncludeCycle(PathBuf),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "CONFD_CONFIG";

/// Settings for one daemon process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
	/// Addresses of the default database, highest priority first.
	pub addresses: Vec<String>,
	/// Source path file contributing further addresses.
	pub path_file: Option<PathBuf>,
	/// Debounce delay between a mutation and its flush.
	pub sync_delay_ms: u64,
	/// Period of the maintenance sweep.
	pub cleanup_interval_secs: u64,
	/// Idle time after which an unused database is closed.
	pub idle_database_secs: u64,
	/// Age after which an unused locale chain is forgotten.
	pub locale_max_age_secs: u64,
	/// Stop once nothing but the default database is in use.
	pub exit_when_unused: bool,
}

impl Default for DaemonConfig {
	fn default() -> Self {
		Self {
			addresses: Vec::new(),
			path_file: None,
			sync_delay_ms: 5000,
			cleanup_interval_secs: 30,
			idle_database_secs: 20 * 60,
			locale_max_age_secs: 30 * 60,
			exit_when_unused: false,
		}
	}
}

impl DaemonConfig {
	/// Parses configuration from TOML text. `path` is only used in errors.
	pub fn parse(text: &str, path: &Path) -> Result<Self> {
		let config: Self = toml::from_str(text).map_err(|error| ConfigError::Parse {
			path: path.to_path_buf(),
			error,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses the file at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&text, path)
	}

	/// Like [`DaemonConfig::load`], but a missing file yields the defaults.
	pub fn load_or_default(path: &Path) -> Result<Self> {
		match Self::load(path) {
			Err(ConfigError::Io { error, .. }) if error.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "no configuration file, using defaults");
				Ok(Self::default())
			}
			other => other,
		}
	}

	/// Rejects values the daemon cannot run with.
	pub fn validate(&self) -> Result<()> {
		if self.cleanup_interval_secs == 0 {
			return Err(ConfigError::Invalid(
				"cleanup_interval_secs must be greater than zero".into(),
			));
		}
		Ok(())
	}

	/// Period of the maintenance sweep.
	pub fn cleanup_interval(&self) -> Duration {
		Duration::from_secs(self.cleanup_interval_secs)
	}

	/// Age after which cached locale chains expire.
	pub fn locale_max_age(&self) -> Duration {
		Duration::from_secs(self.locale_max_age_secs)
	}

	/// Registry settings derived from this configuration.
	pub fn registry_config(&self) -> RegistryConfig {
		RegistryConfig {
			idle_threshold: Duration::from_secs(self.idle_database_secs),
			database: DatabaseConfig {
				sync_delay: Duration::from_millis(self.sync_delay_ms),
			},
		}
	}
}

/// Returns the default configuration file location.
///
/// # Resolution Order
///
/// 1. `CONFD_CONFIG` environment variable.
/// 2. `confd/confd.toml` in the user configuration directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
	if let Ok(p) = std::env::var(CONFIG_ENV) {
		return Some(PathBuf::from(p));
	}
	dirs::config_dir().map(|dir| dir.join("confd").join("confd.toml"))
}
