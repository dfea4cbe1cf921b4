//! Shared data types: entry classification and run reports

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EntryError, MirrorError};

/// Kind of filesystem entry at a path; symlinks are never followed
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryKind {
	Missing,
	Directory,
	File,
	Symlink,
	/// Sockets, FIFOs, block and character devices
	Other,
}

impl EntryKind {
	pub fn from_file_type(ft: fs::FileType) -> Self {
		if ft.is_symlink() {
			EntryKind::Symlink
		} else if ft.is_dir() {
			EntryKind::Directory
		} else if ft.is_file() {
			EntryKind::File
		} else {
			EntryKind::Other
		}
	}

	/// Classify `path` without following a trailing symlink
	pub fn of(path: &Path) -> Result<Self, MirrorError> {
		match fs::symlink_metadata(path) {
			Ok(meta) => Ok(Self::from_file_type(meta.file_type())),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
			Err(e) => Err(MirrorError::io(path, e)),
		}
	}

	/// Classify what `path` resolves to; dangling links are `Missing`
	pub fn of_target(path: &Path) -> Result<Self, MirrorError> {
		match fs::metadata(path) {
			Ok(meta) => Ok(Self::from_file_type(meta.file_type())),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
			Err(e) => Err(MirrorError::io(path, e)),
		}
	}
}

impl fmt::Display for EntryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EntryKind::Missing => "missing",
			EntryKind::Directory => "directory",
			EntryKind::File => "file",
			EntryKind::Symlink => "symlink",
			EntryKind::Other => "special file",
		};
		f.write_str(s)
	}
}

/// A state-changing action taken on the replica.
///
/// The `Display` form is the log line emitted for it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Action {
	CreatedDir { path: PathBuf },
	CopiedFile { from: PathBuf, to: PathBuf },
	UpdatedFile { from: PathBuf, to: PathBuf },
	LinkedSymlink { path: PathBuf, target: PathBuf },
	RemovedDir { path: PathBuf },
	RemovedFile { path: PathBuf },
}

impl Action {
	pub fn is_removal(&self) -> bool {
		matches!(self, Action::RemovedDir { .. } | Action::RemovedFile { .. })
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Action::CreatedDir { path } => write!(f, "Creating directory: {}", path.display()),
			Action::CopiedFile { from, to } => {
				write!(f, "Copying file: {} to {}", from.display(), to.display())
			}
			Action::UpdatedFile { from, to } => {
				write!(f, "Updating file: {} to {}", from.display(), to.display())
			}
			Action::LinkedSymlink { path, target } => {
				write!(f, "Linking: {} -> {}", path.display(), target.display())
			}
			Action::RemovedDir { path } => write!(f, "Removing directory: {}", path.display()),
			Action::RemovedFile { path } => write!(f, "Removing file: {}", path.display()),
		}
	}
}

/// Entry that was deliberately left out of the replica
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Skipped {
	pub path: PathBuf,
	pub kind: EntryKind,
}

/// Outcome of one reconciliation run
#[derive(Debug, Default)]
pub struct RunReport {
	/// Every change made (or, in dry-run mode, planned) in the replica
	pub actions: Vec<Action>,

	/// Per-entry failures; the run carried on past each of them
	pub errors: Vec<EntryError>,

	/// Symlinks and special files left out by policy
	pub skipped: Vec<Skipped>,

	/// Source files whose replica counterpart was checked
	pub files_checked: usize,

	/// Files whose fingerprint came from the persisted index
	pub index_hits: usize,
}

impl RunReport {
	pub fn is_clean(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn has_changes(&self) -> bool {
		!self.actions.is_empty()
	}

	pub fn copies(&self) -> usize {
		self.actions.iter().filter(|a| matches!(a, Action::CopiedFile { .. })).count()
	}

	pub fn updates(&self) -> usize {
		self.actions.iter().filter(|a| matches!(a, Action::UpdatedFile { .. })).count()
	}

	pub fn removals(&self) -> usize {
		self.actions.iter().filter(|a| a.is_removal()).count()
	}
}

impl fmt::Display for RunReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} checked, {} copied, {} updated, {} removed, {} skipped, {} errors",
			self.files_checked,
			self.copies(),
			self.updates(),
			self.removals(),
			self.skipped.len(),
			self.errors.len()
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_entry_kind_of() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("f");
		fs::write(&file, b"x").unwrap();

		assert_eq!(EntryKind::of(dir.path()).unwrap(), EntryKind::Directory);
		assert_eq!(EntryKind::of(&file).unwrap(), EntryKind::File);
		assert_eq!(EntryKind::of(&dir.path().join("nope")).unwrap(), EntryKind::Missing);
	}

	#[cfg(unix)]
	#[test]
	fn test_entry_kind_symlink() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("f");
		let link = dir.path().join("l");
		let dangling = dir.path().join("d");
		fs::write(&file, b"x").unwrap();
		std::os::unix::fs::symlink(&file, &link).unwrap();
		std::os::unix::fs::symlink(dir.path().join("gone"), &dangling).unwrap();

		assert_eq!(EntryKind::of(&link).unwrap(), EntryKind::Symlink);
		assert_eq!(EntryKind::of_target(&link).unwrap(), EntryKind::File);
		assert_eq!(EntryKind::of(&dangling).unwrap(), EntryKind::Symlink);
		assert_eq!(EntryKind::of_target(&dangling).unwrap(), EntryKind::Missing);
	}

	#[test]
	fn test_action_messages() {
		let a = Action::CopiedFile { from: PathBuf::from("/s/a"), to: PathBuf::from("/r/a") };
		assert_eq!(a.to_string(), "Copying file: /s/a to /r/a");
		assert!(!a.is_removal());

		let r = Action::RemovedDir { path: PathBuf::from("/r/old") };
		assert_eq!(r.to_string(), "Removing directory: /r/old");
		assert!(r.is_removal());
	}

	#[test]
	fn test_report_counts() {
		let mut report = RunReport::default();
		assert!(!report.has_changes());
		report.actions.push(Action::CopiedFile { from: "a".into(), to: "b".into() });
		report.actions.push(Action::RemovedFile { path: "c".into() });
		assert_eq!(report.copies(), 1);
		assert_eq!(report.removals(), 1);
		assert_eq!(report.updates(), 0);
		assert!(report.is_clean());
	}
}

// vim: ts=4
