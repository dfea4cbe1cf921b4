//! Policies for entries that are neither regular files nor directories

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How symbolic links found in the source tree are mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SymlinkMode {
	/// Leave symlinks out of the replica and log a warning
	#[default]
	Skip,

	/// Recreate the link itself with the same target (unix only)
	Preserve,

	/// Mirror whatever the link points to; dangling links are skipped
	Follow,
}

impl FromStr for SymlinkMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"skip" | "ignore" => Ok(Self::Skip),
			"preserve" | "keep" => Ok(Self::Preserve),
			"follow" => Ok(Self::Follow),
			_ => Err(format!(
				"Unknown symlink mode: {}. Valid options: skip, preserve, follow",
				s
			)),
		}
	}
}

impl std::fmt::Display for SymlinkMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Skip => write!(f, "skip"),
			Self::Preserve => write!(f, "preserve"),
			Self::Follow => write!(f, "follow"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_symlink_mode_from_str() {
		assert_eq!(SymlinkMode::from_str("skip").unwrap(), SymlinkMode::Skip);
		assert_eq!(SymlinkMode::from_str("IGNORE").unwrap(), SymlinkMode::Skip);
		assert_eq!(SymlinkMode::from_str("preserve").unwrap(), SymlinkMode::Preserve);
		assert_eq!(SymlinkMode::from_str("follow").unwrap(), SymlinkMode::Follow);
		assert!(SymlinkMode::from_str("relative").is_err());
	}

	#[test]
	fn test_symlink_mode_display_roundtrip() {
		for mode in [SymlinkMode::Skip, SymlinkMode::Preserve, SymlinkMode::Follow].iter() {
			assert_eq!(SymlinkMode::from_str(&mode.to_string()).unwrap(), *mode);
		}
	}

	#[test]
	fn test_symlink_mode_default() {
		assert_eq!(SymlinkMode::default(), SymlinkMode::Skip);
	}
}

// vim: ts=4
