//! Pattern-based exclusion using glob patterns

use super::ExclusionError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Pattern matcher using globset for efficient matching
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	exclude_set: GlobSet,
	empty: bool,
}

impl PatternMatcher {
	/// Compile a set of exclusion patterns
	pub fn new(exclude_patterns: &[String]) -> Result<Self, ExclusionError> {
		let mut builder = GlobSetBuilder::new();

		for pattern in exclude_patterns {
			let glob = Glob::new(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			builder.add(glob);
		}

		let exclude_set = builder.build().map_err(|e| {
			ExclusionError::InvalidPattern(format!("Failed to build pattern set: {}", e))
		})?;

		Ok(Self { exclude_set, empty: exclude_patterns.is_empty() })
	}

	/// Check if a root-relative path is excluded by any pattern
	pub fn is_excluded(&self, rel_path: &Path) -> bool {
		!self.empty && self.exclude_set.is_match(rel_path)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_basic_exclusion() {
		let patterns = vec!["*.log".to_string(), "*.tmp".to_string()];
		let matcher = PatternMatcher::new(&patterns).unwrap();

		assert!(matcher.is_excluded(Path::new("test.log")));
		assert!(matcher.is_excluded(Path::new("foo/bar.tmp")));
		assert!(!matcher.is_excluded(Path::new("test.txt")));
	}

	#[test]
	fn test_directory_patterns() {
		let patterns = vec!["node_modules".to_string(), "target/**".to_string()];
		let matcher = PatternMatcher::new(&patterns).unwrap();

		assert!(matcher.is_excluded(Path::new("node_modules")));
		assert!(matcher.is_excluded(Path::new("target/release/binary")));
		assert!(!matcher.is_excluded(Path::new("src/main.rs")));
	}

	#[test]
	fn test_invalid_pattern() {
		let patterns = vec!["a[".to_string()];
		let err = PatternMatcher::new(&patterns).unwrap_err();
		assert!(err.to_string().contains("a["));
	}

	#[test]
	fn test_empty_set_excludes_nothing() {
		let matcher = PatternMatcher::new(&[]).unwrap();
		assert!(!matcher.is_excluded(Path::new("anything")));
		assert!(!matcher.is_excluded(Path::new(".a.txt.syncmirror-tmp")));
	}
}

// vim: ts=4
