//! Error types for SyncMirror operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Main error type for mirror operations
#[derive(Debug)]
pub enum MirrorError {
	/// Source root is missing or not a directory
	SourceInvalid { path: PathBuf },

	/// Entry vanished or never existed
	NotFound { path: PathBuf },

	/// I/O error on a specific path
	Io { path: PathBuf, source: io::Error },

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Fingerprint index failure
	Index { message: String },

	/// A reconciliation task died (panic or cancellation)
	Task { message: String },
}

impl MirrorError {
	/// Wrap an I/O error with the path it happened on.
	///
	/// `ErrorKind::NotFound` becomes `MirrorError::NotFound` so callers can tell
	/// a vanished entry apart from a real read failure.
	pub fn io(path: &Path, err: io::Error) -> Self {
		if err.kind() == io::ErrorKind::NotFound {
			MirrorError::NotFound { path: path.to_path_buf() }
		} else {
			MirrorError::Io { path: path.to_path_buf(), source: err }
		}
	}

	pub fn config(message: impl Into<String>) -> Self {
		MirrorError::InvalidConfig { message: message.into() }
	}

	pub fn index(err: impl fmt::Display) -> Self {
		MirrorError::Index { message: err.to_string() }
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, MirrorError::NotFound { .. })
	}
}

impl fmt::Display for MirrorError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MirrorError::SourceInvalid { path } => {
				write!(f, "Source folder '{}' does not exist or is not a directory", path.display())
			}
			MirrorError::NotFound { path } => write!(f, "No such file or directory: {}", path.display()),
			MirrorError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
			MirrorError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			MirrorError::Index { message } => write!(f, "Fingerprint index error: {}", message),
			MirrorError::Task { message } => write!(f, "Reconciliation task failed: {}", message),
		}
	}
}

impl Error for MirrorError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			MirrorError::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}

/// Filesystem operation that failed on a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	List,
	Compare,
	Copy,
	CreateDir,
	Remove,
	Link,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Operation::List => "listing",
			Operation::Compare => "comparing",
			Operation::Copy => "copying",
			Operation::CreateDir => "creating directory",
			Operation::Remove => "removing",
			Operation::Link => "linking",
		};
		f.write_str(s)
	}
}

/// Per-entry failure recorded during a run; never aborts siblings
#[derive(Debug)]
pub struct EntryError {
	pub path: PathBuf,
	pub operation: Operation,
	pub error: MirrorError,
}

impl fmt::Display for EntryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Error {} {}: {}", self.operation, self.path.display(), self.error)
	}
}

impl Error for EntryError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&self.error)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_not_found_is_distinguished() {
		let err = MirrorError::io(Path::new("/x/y"), io::Error::from(io::ErrorKind::NotFound));
		assert!(err.is_not_found());
		assert_eq!(err.to_string(), "No such file or directory: /x/y");

		let err =
			MirrorError::io(Path::new("/x/y"), io::Error::from(io::ErrorKind::PermissionDenied));
		assert!(!err.is_not_found());
		assert!(err.to_string().starts_with("/x/y: "));
	}

	#[test]
	fn test_entry_error_display() {
		let err = EntryError {
			path: PathBuf::from("/src/a.txt"),
			operation: Operation::Copy,
			error: MirrorError::io(
				Path::new("/src/a.txt"),
				io::Error::from(io::ErrorKind::PermissionDenied),
			),
		};
		let msg = err.to_string();
		assert!(msg.starts_with("Error copying /src/a.txt"), "{}", msg);
	}

	#[test]
	fn test_source_invalid_display() {
		let err = MirrorError::SourceInvalid { path: PathBuf::from("/nope") };
		assert!(err.to_string().contains("'/nope' does not exist"));
	}
}

// vim: ts=4
