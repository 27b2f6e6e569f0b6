//! # SiltKV
//!
//! An embedded, single-writer key-value store organized as a
//! log-structured merge-tree on a local filesystem.
//!
//! Writes land in an in-memory sorted buffer (the memtable) after being
//! made durable in a write-ahead log; when the buffer outgrows its
//! threshold it is flushed to an immutable on-disk sorted run, and runs
//! are compacted pairwise once there are too many of them. Point lookups
//! check the memtable first, then descend the runs from newest to oldest.
//!
//! ## Directory layout
//!
//! All files live in the single directory handed to [`LsmTree::open`]:
//!
//! | File | Purpose |
//! |---|---|
//! | `wal.db` | WAL for the current memtable generation |
//! | `meta.db` | 16 bytes: `[run_count u64 BE][max_index u64 BE]` |
//! | `{i}-data.db` | run `i`'s records in ascending key order |
//! | `{i}-index.db` | run `i`'s dense index |
//! | `{i}-sparse.db` | run `i`'s sparse index |
//! | `merge-*.db` | transient merge output, renamed on success |
//!
//! ## Example
//! ```no_run
//! use silt::{LsmTree, Options};
//!
//! # fn main() -> silt::Result<()> {
//! let mut tree = LsmTree::open("/var/lib/silt", Options::default())?;
//! tree.put(b"name", b"silt")?;
//! assert_eq!(tree.get(b"name")?.as_deref(), Some(b"silt".as_slice()));
//! tree.delete(b"name")?;
//! assert_eq!(tree.get(b"name")?, None);
//! # Ok(())
//! # }
//! ```
//!
//! The tree is single-threaded and single-writer: no operation may run
//! concurrently with another on the same instance, and exactly one
//! instance may hold a directory open.

mod engine;
mod error;
mod meta;
mod options;

pub use engine::{LsmTree, WAL_FILE};
pub use error::{Error, Result};
pub use options::Options;

/// Largest accepted key length in bytes.
pub const MAX_KEY_BYTES: usize = 65535;
/// Largest accepted value length in bytes.
pub const MAX_VALUE_BYTES: usize = 65535;
