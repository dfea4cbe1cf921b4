//! Configuration for SyncMirror
//!
//! A `Config` is built once at startup and then only read. Values follow a
//! priority chain:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Config file (TOML, or JSON/JSON5 chosen by extension)
//! 3. Environment variables (`SYNCMIRROR_*` prefix)
//! 4. CLI flags (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::error::MirrorError;
use crate::exclusion::PatternMatcher;
use crate::strategies::SymlinkMode;

pub const ENV_SOURCE: &str = "SYNCMIRROR_SOURCE";
pub const ENV_REPLICA: &str = "SYNCMIRROR_REPLICA";
pub const ENV_INTERVAL: &str = "SYNCMIRROR_INTERVAL";
pub const ENV_LOG_FILE: &str = "SYNCMIRROR_LOG_FILE";

/// Runtime configuration for the mirror daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Directory treated as ground truth; never written to
	pub source: PathBuf,

	/// Directory kept identical to `source`
	pub replica: PathBuf,

	/// Pause between the end of one run and the start of the next
	pub interval_secs: u64,

	/// Append-only log file; stderr always receives the same lines
	pub log_file: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,

	/// Glob patterns (relative to the roots) that are neither copied nor pruned
	pub exclude_patterns: Vec<String>,

	/// How symlinks in the source are mirrored
	pub symlink_mode: SymlinkMode,

	/// Log what would change without touching the replica
	pub dry_run: bool,

	/// Persisted fingerprint index; `None` hashes every file on every run
	pub index_path: Option<PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			source: PathBuf::new(),
			replica: PathBuf::new(),
			interval_secs: 5,
			log_file: Some(PathBuf::from("syncmirror.log")),
			log_level: "info".to_string(),
			exclude_patterns: vec![],
			symlink_mode: SymlinkMode::Skip,
			dry_run: false,
			index_path: None,
		}
	}
}

impl Config {
	/// Minimal config for a source/replica pair, everything else defaulted
	pub fn new(source: impl Into<PathBuf>, replica: impl Into<PathBuf>) -> Self {
		Config { source: source.into(), replica: replica.into(), ..Config::default() }
	}

	/// Load a config file; format is picked from the extension
	pub fn from_file(path: &Path) -> Result<Self, MirrorError> {
		let contents = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
		let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();

		match ext.as_str() {
			"toml" => toml::from_str(&contents)
				.map_err(|e| MirrorError::config(format!("{}: {}", path.display(), e))),
			"json" | "json5" => json5::from_str(&contents)
				.map_err(|e| MirrorError::config(format!("{}: {}", path.display(), e))),
			_ => Err(MirrorError::config(format!(
				"{}: unsupported config format (expected .toml, .json or .json5)",
				path.display()
			))),
		}
	}

	/// Overlay `SYNCMIRROR_*` environment variables
	pub fn apply_env(&mut self) -> Result<(), MirrorError> {
		self.apply_env_from(|key| env::var(key).ok())
	}

	/// Overlay values from an arbitrary variable lookup
	pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), MirrorError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(v) = lookup(ENV_SOURCE) {
			self.source = PathBuf::from(v);
		}
		if let Some(v) = lookup(ENV_REPLICA) {
			self.replica = PathBuf::from(v);
		}
		if let Some(v) = lookup(ENV_INTERVAL) {
			self.interval_secs = v.trim().parse().map_err(|_| {
				MirrorError::config(format!("{} must be a whole number of seconds, got '{}'", ENV_INTERVAL, v))
			})?;
		}
		if let Some(v) = lookup(ENV_LOG_FILE) {
			self.log_file = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
		}
		Ok(())
	}

	pub fn interval(&self) -> Duration {
		Duration::from_secs(self.interval_secs)
	}

	/// Compile the configured exclusion patterns
	pub fn pattern_matcher(&self) -> Result<PatternMatcher, MirrorError> {
		Ok(PatternMatcher::new(&self.exclude_patterns)?)
	}

	/// Check the three required inputs and everything derived from them
	pub fn validate(&self) -> Result<(), MirrorError> {
		if self.source.as_os_str().is_empty() {
			return Err(MirrorError::config("source directory is not set"));
		}
		if self.replica.as_os_str().is_empty() {
			return Err(MirrorError::config("replica directory is not set"));
		}
		if self.interval_secs == 0 {
			return Err(MirrorError::config("interval must be greater than 0"));
		}

		let source = normalize(&self.source);
		let replica = normalize(&self.replica);
		if source == replica {
			return Err(MirrorError::config("source and replica are the same directory"));
		}
		if replica.starts_with(&source) {
			return Err(MirrorError::config(format!(
				"replica {} is inside source {}",
				self.replica.display(),
				self.source.display()
			)));
		}
		if source.starts_with(&replica) {
			return Err(MirrorError::config(format!(
				"source {} is inside replica {}",
				self.source.display(),
				self.replica.display()
			)));
		}

		self.pattern_matcher()?;
		Ok(())
	}
}

/// Absolute, lexically cleaned path; does not touch the filesystem
fn normalize(path: &Path) -> PathBuf {
	let abs = if path.is_absolute() {
		path.to_path_buf()
	} else {
		env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
	};

	let mut out = PathBuf::new();
	for component in abs.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				out.pop();
			}
			c => out.push(c.as_os_str()),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use tempfile::TempDir;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.interval_secs, 5);
		assert_eq!(config.log_level, "info");
		assert_eq!(config.symlink_mode, SymlinkMode::Skip);
		assert!(!config.dry_run);
		assert!(config.index_path.is_none());
	}

	#[test]
	fn test_validate_ok() {
		assert!(Config::new("/data/src", "/data/replica").validate().is_ok());
	}

	#[test]
	fn test_validate_rejects_missing_inputs() {
		assert!(Config::new("", "/r").validate().is_err());
		assert!(Config::new("/s", "").validate().is_err());

		let mut config = Config::new("/s", "/r");
		config.interval_secs = 0;
		assert!(config.validate().unwrap_err().to_string().contains("interval"));
	}

	#[test]
	fn test_validate_rejects_nesting() {
		assert!(Config::new("/data/src", "/data/src/replica").validate().is_err());
		assert!(Config::new("/data/replica/src", "/data/replica").validate().is_err());
		assert!(Config::new("/data/src", "/data/./src").validate().is_err());
		assert!(Config::new("/data/src", "/data/src2").validate().is_ok());
	}

	#[test]
	fn test_validate_rejects_bad_pattern() {
		let mut config = Config::new("/s", "/r");
		config.exclude_patterns = vec!["[".to_string()];
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_env_overlay() {
		let vars: HashMap<&str, &str> = [
			(ENV_SOURCE, "/env/src"),
			(ENV_REPLICA, "/env/replica"),
			(ENV_INTERVAL, "30"),
			(ENV_LOG_FILE, ""),
		]
		.iter()
		.cloned()
		.collect();

		let mut config = Config::default();
		config.apply_env_from(|k| vars.get(k).map(|v| v.to_string())).unwrap();
		assert_eq!(config.source, PathBuf::from("/env/src"));
		assert_eq!(config.replica, PathBuf::from("/env/replica"));
		assert_eq!(config.interval(), Duration::from_secs(30));
		assert!(config.log_file.is_none());
	}

	#[test]
	fn test_env_bad_interval() {
		let mut config = Config::default();
		let result = config.apply_env_from(|k| {
			if k == ENV_INTERVAL {
				Some("soon".to_string())
			} else {
				None
			}
		});
		assert!(result.is_err());
	}

	#[test]
	fn test_from_toml_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("mirror.toml");
		fs::write(
			&path,
			r#"
source = "/a"
replica = "/b"
intervalSecs = 60
excludePatterns = ["*.tmp"]
symlinkMode = "preserve"
"#,
		)
		.unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.source, PathBuf::from("/a"));
		assert_eq!(config.interval_secs, 60);
		assert_eq!(config.exclude_patterns, vec!["*.tmp".to_string()]);
		assert_eq!(config.symlink_mode, SymlinkMode::Preserve);
		// Unset fields keep their defaults
		assert_eq!(config.log_level, "info");
	}

	#[test]
	fn test_from_json5_file() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("mirror.json5");
		fs::write(&path, "{ source: '/a', replica: '/b', dryRun: true, // comment\n }").unwrap();

		let config = Config::from_file(&path).unwrap();
		assert_eq!(config.replica, PathBuf::from("/b"));
		assert!(config.dry_run);
	}

	#[test]
	fn test_from_file_unknown_extension() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("mirror.ini");
		fs::write(&path, "source=/a").unwrap();
		assert!(Config::from_file(&path).is_err());
	}

	#[test]
	fn test_config_serialization() {
		let config = Config::new("/a", "/b");
		let json = serde_json::to_string(&config).expect("Failed to serialize");
		let deserialized: Config = serde_json::from_str(&json).expect("Failed to deserialize");
		assert_eq!(config.source, deserialized.source);
		assert_eq!(config.interval_secs, deserialized.interval_secs);
	}
}

// vim: ts=4
