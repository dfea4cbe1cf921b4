//! Persisted fingerprint index
//!
//! Stores file stamps and fingerprints to avoid re-hashing unchanged files
//! between runs. A cached fingerprint is only trusted when size, mtime, ctime
//! and inode all still match, so a rewrite that restores the old mtime is
//! still noticed (ctime cannot be set back from userspace).

use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::MirrorError;
use crate::fingerprint::Fingerprint;

/// Table definition for fingerprint entries
/// Key: absolute file path (String)
/// Value: serialized IndexEntry (bytes)
const FINGERPRINTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("fingerprints");

/// Metadata a cached fingerprint is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
	#[serde(rename = "sz")]
	pub size: u64,
	#[serde(rename = "ms")]
	pub mtime_secs: i64,
	#[serde(rename = "mn")]
	pub mtime_nsec: u32,
	#[serde(rename = "cs")]
	pub ctime_secs: i64,
	#[serde(rename = "cn")]
	pub ctime_nsec: u32,
	#[serde(rename = "ino")]
	pub inode: u64,
}

impl FileStamp {
	pub fn from_metadata(meta: &fs::Metadata) -> Self {
		let mtime = filetime::FileTime::from_last_modification_time(meta);

		#[cfg(unix)]
		let (ctime_secs, ctime_nsec, inode) = {
			use std::os::unix::fs::MetadataExt;
			(meta.ctime(), meta.ctime_nsec() as u32, meta.ino())
		};
		#[cfg(not(unix))]
		let (ctime_secs, ctime_nsec, inode) = (0, 0, 0);

		FileStamp {
			size: meta.len(),
			mtime_secs: mtime.unix_seconds(),
			mtime_nsec: mtime.nanoseconds(),
			ctime_secs,
			ctime_nsec,
			inode,
		}
	}

	pub fn of(path: &Path) -> Result<Self, MirrorError> {
		let meta = fs::metadata(path).map_err(|e| MirrorError::io(path, e))?;
		Ok(Self::from_metadata(&meta))
	}
}

/// Cache entry for a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
	#[serde(rename = "st")]
	pub stamp: FileStamp,
	#[serde(rename = "fp")]
	pub fingerprint: String,
}

/// Fingerprint index backed by a redb database
pub struct FingerprintIndex {
	db: redb::Database,
}

impl FingerprintIndex {
	/// Open or create the index database
	pub fn open(db_path: &Path) -> Result<Self, MirrorError> {
		let db = redb::Database::create(db_path).map_err(MirrorError::index)?;
		{
			let write_txn = db.begin_write().map_err(MirrorError::index)?;
			let _ = write_txn.open_table(FINGERPRINTS_TABLE).map_err(MirrorError::index)?;
			write_txn.commit().map_err(MirrorError::index)?;
		}
		Ok(FingerprintIndex { db })
	}

	/// Cached fingerprint for `path`, if its stamp is unchanged
	pub fn lookup(&self, path: &str, stamp: &FileStamp) -> Result<Option<Fingerprint>, MirrorError> {
		let read_txn = self.db.begin_read().map_err(MirrorError::index)?;
		let table = read_txn.open_table(FINGERPRINTS_TABLE).map_err(MirrorError::index)?;

		match table.get(path).map_err(MirrorError::index)? {
			Some(value) => {
				let entry: IndexEntry =
					serde_json::from_slice(value.value()).map_err(MirrorError::index)?;
				if entry.stamp != *stamp {
					return Ok(None);
				}
				Ok(Fingerprint::from_hex(&entry.fingerprint))
			}
			None => Ok(None),
		}
	}

	/// Write a run's fresh entries and drop every key not in `keep`.
	///
	/// Done in a single transaction at the end of a run. Returns the number of
	/// stale entries removed.
	pub fn commit(
		&self,
		updates: &[(String, FileStamp, Fingerprint)],
		keep: &HashSet<String>,
	) -> Result<usize, MirrorError> {
		let write_txn = self.db.begin_write().map_err(MirrorError::index)?;
		let removed;
		{
			let mut table = write_txn.open_table(FINGERPRINTS_TABLE).map_err(MirrorError::index)?;

			for (path, stamp, fingerprint) in updates {
				let entry = IndexEntry { stamp: *stamp, fingerprint: fingerprint.to_hex() };
				let bytes = serde_json::to_vec(&entry).map_err(MirrorError::index)?;
				table.insert(path.as_str(), bytes.as_slice()).map_err(MirrorError::index)?;
			}

			let mut stale = Vec::new();
			for item in table.iter().map_err(MirrorError::index)? {
				let (key, _) = item.map_err(MirrorError::index)?;
				let key = key.value().to_string();
				if !keep.contains(&key) {
					stale.push(key);
				}
			}
			for key in &stale {
				table.remove(key.as_str()).map_err(MirrorError::index)?;
			}
			removed = stale.len();
		}
		write_txn.commit().map_err(MirrorError::index)?;
		Ok(removed)
	}
}


// vim: ts=4
