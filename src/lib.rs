//! # SyncMirror - One-way Periodic Directory Mirroring
//!
//! SyncMirror keeps a replica directory tree identical to a source tree. Each
//! run copies new files, overwrites files whose content fingerprint changed
//! and removes everything the source no longer has. A scheduler repeats the
//! run at a fixed interval and keeps going whatever a single run runs into.
//!
//! ## One-shot mirroring
//!
//! ```rust,ignore
//! use std::path::Path;
//! use syncmirror::reconcile::reconcile;
//!
//! let report = reconcile(Path::new("./source"), Path::new("./replica"))?;
//! println!("{}", report);
//! ```
//!
//! ## Running as a daemon
//!
//! ```rust,ignore
//! use syncmirror::{Config, Scheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("./source", "./replica");
//!     Scheduler::new(&config)?.run_forever().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod fingerprint;
pub mod logging;
pub mod reconcile;
pub mod scheduler;
pub mod strategies;
pub mod types;

// Re-export commonly used types and functions
pub use config::Config;
pub use error::{EntryError, MirrorError, Operation};
pub use fingerprint::{contents_differ, fingerprint, Fingerprint};
pub use reconcile::{reconcile, Reconciler};
pub use scheduler::{Reconcile, Scheduler};
pub use strategies::SymlinkMode;
pub use types::{Action, EntryKind, RunReport};

// vim: ts=4
