//! Exclusion of entries from mirroring
//!
//! Exclusion patterns are matched against paths relative to the mirror roots.
//! An excluded entry is neither copied into the replica nor pruned from it.

mod patterns;

pub use patterns::PatternMatcher;

/// Errors that can occur during exclusion processing
#[derive(Debug)]
pub enum ExclusionError {
	/// Failed to parse a glob pattern
	InvalidPattern(String),
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => {
				write!(f, "Invalid exclusion pattern: {}", msg)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}

impl From<ExclusionError> for crate::error::MirrorError {
	fn from(e: ExclusionError) -> Self {
		crate::error::MirrorError::config(e.to_string())
	}
}

// vim: ts=4
