//! # Sorted runs
//!
//! Immutable, on-disk storage files for the SiltKV storage engine.
//!
//! When the in-memory [`memtable::Memtable`] exceeds its size threshold the
//! engine flushes it to disk as a sorted run. Runs are **write-once,
//! read-many** — once created they are never modified, only replaced by a
//! pairwise merge during compaction.
//!
//! ## Run layout
//!
//! A run with index `i` is a triple of files, all using the shared record
//! framing from the [`format`] crate:
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ {i}-data.db    records in ascending key order      │
//! │                                                    │
//! │ [frame_len u64 BE][key_len u64 BE][key][value]     │
//! ├────────────────────────────────────────────────────┤
//! │ {i}-index.db   dense index: one entry per record   │
//! │                                                    │
//! │ (key, offset of that record in the data file)      │
//! ├────────────────────────────────────────────────────┤
//! │ {i}-sparse.db  every Nth dense entry               │
//! │                                                    │
//! │ (key, offset of that entry in the dense index)     │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! A point lookup streams the sparse index to bound a dense-index scan to
//! at most N entries, then performs a single seek into the data file.
//! Nothing is ever loaded whole; each lookup opens the three files on
//! demand and closes them on return.
//!
//! A tombstone is a record with a zero-length value. It participates in
//! merges like any other record so that it keeps shadowing older runs.

use format::CodecError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod iter;
mod merge;
mod reader;
mod writer;

pub use iter::TableIter;
pub use merge::{merge_tables, remove_stale_merge};
pub use reader::{search, search_run_set, Lookup};
pub use writer::{flush_memtable, TableWriter};

/// Data file name, behind a run prefix.
pub const DATA_FILE: &str = "data.db";
/// Dense index file name, behind a run prefix.
pub const INDEX_FILE: &str = "index.db";
/// Sparse index file name, behind a run prefix.
pub const SPARSE_FILE: &str = "sparse.db";
/// Prefix of an in-flight merge output, renamed to a run prefix on success.
pub const MERGE_PREFIX: &str = "merge-";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("corrupt table: {0}")]
    Corruption(&'static str),
}

/// Returns the file-name prefix of run `index`, e.g. `"3-"`.
pub fn table_prefix(index: i64) -> String {
    format!("{index}-")
}

pub(crate) fn file_path(dir: &Path, prefix: &str, name: &str) -> PathBuf {
    dir.join(format!("{prefix}{name}"))
}
