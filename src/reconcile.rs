//! One-way tree reconciliation
//!
//! A run walks the source tree with an explicit work stack of directory
//! pairs. Each pair is handled in two passes: pass 1 copies/updates every
//! source entry into the replica and schedules subdirectories, pass 2 prunes
//! replica entries whose names are absent from the source. Failures on a
//! single entry are recorded and never stop its siblings.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::cache::{FileStamp, FingerprintIndex};
use crate::config::Config;
use crate::error::{EntryError, MirrorError, Operation};
use crate::exclusion::PatternMatcher;
use crate::fingerprint::{self, Fingerprint};
use crate::logging::*;
use crate::strategies::SymlinkMode;
use crate::types::{Action, EntryKind, RunReport, Skipped};

/// Suffix of the staging entries a change is built in before being renamed
pub const TEMP_SUFFIX: &str = ".syncmirror-tmp";

/// Mirror `source` onto `replica` once with default settings
pub fn reconcile(source: &Path, replica: &Path) -> Result<RunReport, MirrorError> {
	Reconciler::new(&Config::new(source, replica))?.run()
}

/// Per-run mutable state; nothing here outlives a run
#[derive(Default)]
struct RunState {
	report: RunReport,
	index_updates: Vec<(String, FileStamp, Fingerprint)>,
	index_keep: HashSet<String>,
}

impl RunState {
	fn record(&mut self, action: Action) {
		info!("{}", action);
		self.report.actions.push(action);
	}

	fn fail(&mut self, err: EntryError) {
		error!("{}", err);
		self.report.errors.push(err);
	}

	fn skip(&mut self, path: PathBuf, kind: EntryKind) {
		warn!("Skipping {}: {}", kind, path.display());
		self.report.skipped.push(Skipped { path, kind });
	}
}

/// A directory pair waiting on the work stack
struct PendingDir {
	rel: PathBuf,
	/// Dry run only: the replica directory was planned, never created
	planned: bool,
}

fn entry_err(path: &Path, operation: Operation) -> impl FnOnce(MirrorError) -> EntryError {
	let path = path.to_path_buf();
	move |error| EntryError { path, operation, error }
}

/// Converges a replica tree onto a source tree
pub struct Reconciler {
	source: PathBuf,
	replica: PathBuf,
	excludes: PatternMatcher,
	symlink_mode: SymlinkMode,
	dry_run: bool,
	index: Option<FingerprintIndex>,
}

impl Reconciler {
	/// Build a reconciler from a validated config; opens the index if configured
	pub fn new(config: &Config) -> Result<Self, MirrorError> {
		config.validate()?;
		let index = match &config.index_path {
			Some(path) => Some(FingerprintIndex::open(path)?),
			None => None,
		};

		Ok(Reconciler {
			source: config.source.clone(),
			replica: config.replica.clone(),
			excludes: config.pattern_matcher()?,
			symlink_mode: config.symlink_mode,
			dry_run: config.dry_run,
			index,
		})
	}

	/// Run one full reconciliation.
	///
	/// Returns `Err` only when the source root is unusable, in which case the
	/// replica has not been touched. Per-entry failures end up in the report.
	pub fn run(&self) -> Result<RunReport, MirrorError> {
		match fs::metadata(&self.source) {
			Ok(meta) if meta.is_dir() => {}
			Ok(_) => return Err(MirrorError::SourceInvalid { path: self.source.clone() }),
			Err(e) => {
				return Err(match MirrorError::io(&self.source, e) {
					MirrorError::NotFound { path } => MirrorError::SourceInvalid { path },
					other => other,
				})
			}
		}

		let mut run = RunState::default();
		let mut pending = vec![PendingDir { rel: PathBuf::new(), planned: false }];
		while let Some(dir) = pending.pop() {
			self.reconcile_dir(dir, &mut run, &mut pending);
		}

		if let Some(index) = &self.index {
			if !self.dry_run {
				match index.commit(&run.index_updates, &run.index_keep) {
					Ok(pruned) if pruned > 0 => debug!("Dropped {} stale index entries", pruned),
					Ok(_) => {}
					Err(e) => warn!("Cannot update fingerprint index: {}", e),
				}
			}
		}

		let report = run.report;
		if report.has_changes() || !report.is_clean() {
			info!(
				"Synchronized {} to {}: {}",
				self.source.display(),
				self.replica.display(),
				report
			);
		} else {
			debug!("{} is up to date ({})", self.replica.display(), report);
		}
		Ok(report)
	}

	/// Both passes for one directory pair; subdirectories go onto `pending`
	fn reconcile_dir(&self, dir: PendingDir, run: &mut RunState, pending: &mut Vec<PendingDir>) {
		let rel = dir.rel;
		let src_dir = self.source.join(&rel);
		let dst_dir = self.replica.join(&rel);

		// The source listing must succeed before anything is pruned
		let src_entries = match list_dir(&src_dir) {
			Ok(entries) => entries,
			Err(e) => {
				run.fail(EntryError { path: src_dir, operation: Operation::List, error: e });
				return;
			}
		};

		let planned = match self.ensure_dir(&rel, &src_dir, &dst_dir, dir.planned, run) {
			Ok(planned) => planned,
			Err(e) => {
				run.fail(e);
				return;
			}
		};

		// Pass 1: source -> replica
		for (name, kind) in &src_entries {
			let rel_child = rel.join(name);
			if self.excludes.is_excluded(&rel_child) {
				debug!("Excluded: {}", rel_child.display());
				continue;
			}

			let src_path = src_dir.join(name);
			let dst_path = dst_dir.join(name);

			let kind = match *kind {
				EntryKind::Symlink => match self.symlink_mode {
					SymlinkMode::Skip => {
						run.skip(src_path, EntryKind::Symlink);
						continue;
					}
					SymlinkMode::Preserve => {
						if let Err(e) = self.mirror_symlink(&src_path, &dst_path, planned, run) {
							run.fail(e);
						}
						continue;
					}
					SymlinkMode::Follow => match EntryKind::of_target(&src_path) {
						Ok(EntryKind::Missing) => {
							warn!("Skipping dangling symlink: {}", src_path.display());
							run.report.skipped.push(Skipped { path: src_path, kind: EntryKind::Symlink });
							continue;
						}
						Ok(EntryKind::Directory) if self.links_to_ancestor(&src_path, &rel) => {
							warn!("Skipping symlink cycle: {}", src_path.display());
							run.report.skipped.push(Skipped { path: src_path, kind: EntryKind::Symlink });
							continue;
						}
						Ok(target_kind) => target_kind,
						Err(e) => {
							run.fail(EntryError { path: src_path, operation: Operation::List, error: e });
							continue;
						}
					},
				},
				other => other,
			};

			match kind {
				EntryKind::Directory => pending.push(PendingDir { rel: rel_child, planned }),
				EntryKind::File => {
					if let Err(e) = self.sync_file(&src_path, &dst_path, planned, run) {
						run.fail(e);
					}
				}
				EntryKind::Other | EntryKind::Symlink => run.skip(src_path, kind),
				EntryKind::Missing => {}
			}
		}

		// Pass 2: prune replica entries absent from the source
		if planned {
			return;
		}
		let dst_entries = match list_dir(&dst_dir) {
			Ok(entries) => entries,
			Err(e) if self.dry_run && e.is_not_found() => BTreeMap::new(),
			Err(e) => {
				run.fail(EntryError { path: dst_dir, operation: Operation::List, error: e });
				return;
			}
		};

		for (name, kind) in dst_entries {
			if src_entries.contains_key(&name) {
				continue;
			}
			if self.excludes.is_excluded(&rel.join(&name)) {
				continue;
			}
			let dst_path = dst_dir.join(&name);
			if let Err(e) = self.remove_entry(&dst_path, kind, run) {
				run.fail(e);
			}
		}
	}

	/// Make sure the replica directory exists, replacing a non-directory in its way.
	///
	/// Returns true when the directory only exists in a dry-run plan.
	fn ensure_dir(
		&self,
		rel: &Path,
		src_dir: &Path,
		dst_dir: &Path,
		planned: bool,
		run: &mut RunState,
	) -> Result<bool, EntryError> {
		if planned {
			run.record(Action::CreatedDir { path: dst_dir.to_path_buf() });
			return Ok(true);
		}

		let kind = if rel.as_os_str().is_empty() {
			// The replica root itself may be a symlink to a directory
			EntryKind::of_target(dst_dir)
		} else {
			EntryKind::of(dst_dir)
		}
		.map_err(entry_err(dst_dir, Operation::CreateDir))?;

		match kind {
			EntryKind::Directory => return Ok(false),
			EntryKind::Missing => {
				if !self.dry_run {
					fs::create_dir_all(dst_dir)
						.map_err(|e| MirrorError::io(dst_dir, e))
						.map_err(entry_err(dst_dir, Operation::CreateDir))?;
				}
			}
			other => self.replace(src_dir, dst_dir, other, Operation::CreateDir, run, |staging| {
				fs::create_dir(staging).map_err(|e| MirrorError::io(staging, e))
			})?,
		}
		run.record(Action::CreatedDir { path: dst_dir.to_path_buf() });
		Ok(self.dry_run)
	}

	fn sync_file(&self, src: &Path, dst: &Path, planned: bool, run: &mut RunState) -> Result<(), EntryError> {
		run.report.files_checked += 1;

		let dst_kind = if planned {
			EntryKind::Missing
		} else {
			EntryKind::of(dst).map_err(entry_err(dst, Operation::Compare))?
		};

		let (action, displaced, src_fp) = match dst_kind {
			EntryKind::File => {
				let (changed, src_fp) = self.compare(src, dst, run)?;
				if !changed {
					return Ok(());
				}
				// rename swaps the file in place
				let action = Action::UpdatedFile { from: src.to_path_buf(), to: dst.to_path_buf() };
				(action, EntryKind::Missing, src_fp)
			}
			other => (Action::CopiedFile { from: src.to_path_buf(), to: dst.to_path_buf() }, other, None),
		};

		self.replace(src, dst, displaced, Operation::Copy, run, |staging| stage_file(src, staging))?;
		if let Some(fp) = src_fp {
			self.remember(dst, fp, run);
		}
		run.record(action);
		Ok(())
	}

	fn mirror_symlink(
		&self,
		src: &Path,
		dst: &Path,
		planned: bool,
		run: &mut RunState,
	) -> Result<(), EntryError> {
		let target = fs::read_link(src)
			.map_err(|e| MirrorError::io(src, e))
			.map_err(entry_err(src, Operation::Link))?;

		let existing = if planned {
			EntryKind::Missing
		} else {
			EntryKind::of(dst).map_err(entry_err(dst, Operation::Link))?
		};
		let displaced = match existing {
			EntryKind::Symlink => {
				let current = fs::read_link(dst)
					.map_err(|e| MirrorError::io(dst, e))
					.map_err(entry_err(dst, Operation::Link))?;
				if current == target {
					return Ok(());
				}
				EntryKind::Missing
			}
			other => other,
		};

		self.replace(src, dst, displaced, Operation::Link, run, |staging| make_symlink(&target, staging))?;
		run.record(Action::LinkedSymlink { path: dst.to_path_buf(), target });
		Ok(())
	}

	/// Build a new entry at a staging path next to `dst`, then rename it over `dst`.
	///
	/// `displaced` is a wrong-kind entry at `dst` that a rename cannot replace.
	/// It is removed only after the new entry is fully built, so a failure
	/// leaves the replica as it was. Nothing is touched in a dry run.
	fn replace<F>(
		&self,
		src: &Path,
		dst: &Path,
		displaced: EntryKind,
		operation: Operation,
		run: &mut RunState,
		build: F,
	) -> Result<(), EntryError>
	where
		F: FnOnce(&Path) -> Result<(), MirrorError>,
	{
		if self.dry_run {
			if displaced != EntryKind::Missing {
				self.remove_entry(dst, displaced, run)?;
			}
			return Ok(());
		}

		let subject = if operation == Operation::Copy { src } else { dst };
		let staging = staging_path(src, dst);
		if let Err(e) = build(&staging) {
			discard(&staging);
			return Err(EntryError { path: subject.to_path_buf(), operation, error: e });
		}

		if displaced != EntryKind::Missing {
			if let Err(e) = self.remove_entry(dst, displaced, run) {
				discard(&staging);
				return Err(e);
			}
		}

		fs::rename(&staging, dst).map_err(|e| {
			discard(&staging);
			EntryError { path: subject.to_path_buf(), operation, error: MirrorError::io(dst, e) }
		})
	}

	fn remove_entry(&self, path: &Path, kind: EntryKind, run: &mut RunState) -> Result<(), EntryError> {
		let action = if kind == EntryKind::Directory {
			if !self.dry_run {
				fs::remove_dir_all(path)
					.map_err(|e| MirrorError::io(path, e))
					.map_err(entry_err(path, Operation::Remove))?;
			}
			Action::RemovedDir { path: path.to_path_buf() }
		} else {
			if !self.dry_run {
				fs::remove_file(path)
					.map_err(|e| MirrorError::io(path, e))
					.map_err(entry_err(path, Operation::Remove))?;
			}
			Action::RemovedFile { path: path.to_path_buf() }
		};
		run.record(action);
		Ok(())
	}

	/// Whether a followed directory link resolves to the directory holding it
	/// or one of that directory's ancestors
	fn links_to_ancestor(&self, link: &Path, rel_dir: &Path) -> bool {
		let target = match fs::canonicalize(link) {
			Ok(target) => target,
			Err(_) => return false,
		};
		rel_dir
			.ancestors()
			.any(|dir| fs::canonicalize(self.source.join(dir)).map_or(false, |d| d == target))
	}

	/// Content comparison of two regular files.
	///
	/// With an index, also returns the source fingerprint so the fresh replica
	/// copy can be recorded without hashing it again.
	fn compare(
		&self,
		src: &Path,
		dst: &Path,
		run: &mut RunState,
	) -> Result<(bool, Option<Fingerprint>), EntryError> {
		let index = match &self.index {
			Some(index) => index,
			None => {
				let changed =
					fingerprint::contents_differ(src, dst).map_err(entry_err(src, Operation::Compare))?;
				return Ok((changed, None));
			}
		};

		let src_fp = self.indexed_fingerprint(index, src, run).map_err(entry_err(src, Operation::Compare))?;
		let dst_fp = self.indexed_fingerprint(index, dst, run).map_err(entry_err(dst, Operation::Compare))?;
		Ok((src_fp != dst_fp, Some(src_fp)))
	}

	fn indexed_fingerprint(
		&self,
		index: &FingerprintIndex,
		path: &Path,
		run: &mut RunState,
	) -> Result<Fingerprint, MirrorError> {
		let key = match path.to_str() {
			Some(key) => key.to_string(),
			None => return fingerprint::fingerprint(path),
		};

		let stamp = FileStamp::of(path)?;
		run.index_keep.insert(key.clone());
		match index.lookup(&key, &stamp) {
			Ok(Some(fp)) => {
				run.report.index_hits += 1;
				return Ok(fp);
			}
			Ok(None) => {}
			Err(e) => warn!("Fingerprint index lookup failed for {}: {}", path.display(), e),
		}

		let fp = fingerprint::fingerprint(path)?;
		// Only cache if the file did not change while it was being hashed
		if FileStamp::of(path).ok() == Some(stamp) {
			run.index_updates.push((key, stamp, fp));
		}
		Ok(fp)
	}

	/// Record the fingerprint of a freshly written replica file
	fn remember(&self, path: &Path, fp: Fingerprint, run: &mut RunState) {
		if self.index.is_none() || self.dry_run {
			return;
		}
		if let (Some(key), Ok(stamp)) = (path.to_str(), FileStamp::of(path)) {
			run.index_keep.insert(key.to_string());
			run.index_updates.push((key.to_string(), stamp, fp));
		}
	}
}

/// Directory entries by name; kinds come from the entry itself, not its target
fn list_dir(dir: &Path) -> Result<BTreeMap<OsString, EntryKind>, MirrorError> {
	let mut entries = BTreeMap::new();
	for entry in fs::read_dir(dir).map_err(|e| MirrorError::io(dir, e))? {
		let entry = entry.map_err(|e| MirrorError::io(dir, e))?;
		let kind = match entry.file_type() {
			Ok(ft) => EntryKind::from_file_type(ft),
			Err(e) => return Err(MirrorError::io(&entry.path(), e)),
		};
		entries.insert(entry.file_name(), kind);
	}
	Ok(entries)
}

/// Staging path next to `dst`, so the final rename stays on one filesystem.
///
/// The name never matches an entry beside `src`: the staging entry must not
/// clobber a mirrored sibling, and a leftover one is pruned like any other
/// name the source lacks.
fn staging_path(src: &Path, dst: &Path) -> PathBuf {
	let name = dst.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
	let mut candidate = format!(".{}{}", name, TEMP_SUFFIX);
	let mut n = 0u32;
	while fs::symlink_metadata(src.with_file_name(&candidate)).is_ok() {
		n += 1;
		candidate = format!(".{}.{}{}", name, n, TEMP_SUFFIX);
	}
	dst.with_file_name(candidate)
}

/// Best-effort removal of a staging entry after a failed change
fn discard(staging: &Path) {
	let result = match fs::symlink_metadata(staging) {
		Ok(meta) if meta.is_dir() => fs::remove_dir_all(staging),
		Ok(_) => fs::remove_file(staging),
		Err(_) => return,
	};
	if let Err(e) = result {
		debug!("Cannot remove staging entry {}: {}", staging.display(), e);
	}
}

/// Copy content, permissions and timestamps of `src` into `staging`
fn stage_file(src: &Path, staging: &Path) -> Result<(), MirrorError> {
	fs::copy(src, staging).map_err(|e| MirrorError::io(src, e))?;

	let meta = fs::metadata(src).map_err(|e| MirrorError::io(src, e))?;
	let atime = FileTime::from_last_access_time(&meta);
	let mtime = FileTime::from_last_modification_time(&meta);
	filetime::set_file_times(staging, atime, mtime).map_err(|e| MirrorError::io(staging, e))
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<(), MirrorError> {
	std::os::unix::fs::symlink(target, link).map_err(|e| MirrorError::io(link, e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, link: &Path) -> Result<(), MirrorError> {
	Err(MirrorError::io(
		link,
		std::io::Error::new(std::io::ErrorKind::Other, "symlink preservation needs a unix host"),
	))
}


// vim: ts=4
