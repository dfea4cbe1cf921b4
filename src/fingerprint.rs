//! Content fingerprinting using BLAKE3
//!
//! Two files are considered identical when their fingerprints match.
//! Metadata (timestamps, permissions) never takes part in the digest.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// Read buffer size used while hashing
const CHUNK_SIZE: usize = 64 * 1024;

/// A 256-bit content digest
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
	pub fn from_bytes(data: &[u8]) -> Self {
		Fingerprint(*blake3::hash(data).as_bytes())
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	/// Parse a hex digest as stored in the fingerprint index
	pub fn from_hex(s: &str) -> Option<Self> {
		let bytes = hex::decode(s).ok()?;
		if bytes.len() != 32 {
			return None;
		}
		let mut out = [0u8; 32];
		out.copy_from_slice(&bytes);
		Some(Fingerprint(out))
	}
}

impl fmt::Debug for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let hex = self.to_hex();
		write!(f, "Fingerprint({})", &hex[..16])
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

/// Hash the full byte stream of a regular file.
///
/// The file is read sequentially in fixed-size chunks. A missing file yields
/// `MirrorError::NotFound`; any other open or read failure yields
/// `MirrorError::Io` naming the path.
pub fn fingerprint(path: &Path) -> Result<Fingerprint, MirrorError> {
	let mut file = fs::File::open(path).map_err(|e| MirrorError::io(path, e))?;
	let mut hasher = blake3::Hasher::new();
	let mut buffer = vec![0u8; CHUNK_SIZE];

	loop {
		let n = match file.read(&mut buffer) {
			Ok(0) => break,
			Ok(n) => n,
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(MirrorError::io(path, e)),
		};
		hasher.update(&buffer[..n]);
	}

	Ok(Fingerprint(*hasher.finalize().as_bytes()))
}

/// Compare two regular files by content.
///
/// Only call this when both paths are known to be regular files.
pub fn contents_differ(a: &Path, b: &Path) -> Result<bool, MirrorError> {
	Ok(fingerprint(a)? != fingerprint(b)?)
}


// vim: ts=4
