//! Two-level point lookup over a run's on-disk indexes.
//!
//! The sparse index is streamed start to end (it holds every Nth key) to
//! bound a dense-index scan to at most N entries; the dense entry then
//! gives the exact data-file offset for a single seek and read. Both
//! indexes stay on disk; only small iteration buffers are resident.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::{file_path, table_prefix, TableError, DATA_FILE, INDEX_FILE, SPARSE_FILE};

/// Outcome of a lookup in a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The run holds this value for the key.
    Hit(Vec<u8>),
    /// The run marks the key deleted. The descent into older runs stops.
    Tombstone,
    /// The run does not mention the key.
    Miss,
}

/// The dense-index window a sparse scan narrowed the key down to.
enum SparseScan {
    /// The key sorts below the run's smallest key (or the run is empty).
    Miss,
    /// Scan the dense index from `from` up to `to`; `to: None` means to
    /// EOF. When the sparse index named the key itself, `from` is that
    /// key's own dense entry and the first read hits.
    Scan { from: u64, to: Option<u64> },
}

/// Searches run `index` under `dir` for `key`.
pub fn search(dir: &Path, index: i64, key: &[u8]) -> Result<Lookup, TableError> {
    let prefix = table_prefix(index);
    let (from, to) = match scan_sparse(dir, &prefix, key)? {
        SparseScan::Miss => return Ok(Lookup::Miss),
        SparseScan::Scan { from, to } => (from, to),
    };
    match scan_dense(dir, &prefix, key, from, to)? {
        None => Ok(Lookup::Miss),
        Some(data_offset) => read_data(dir, &prefix, key, data_offset),
    }
}

/// Descends the run set from `max_index` across `run_count` runs, newest
/// first. The first run that mentions the key decides the outcome: a
/// newer value shadows older ones and a tombstone stops the descent.
pub fn search_run_set(
    dir: &Path,
    max_index: i64,
    run_count: usize,
    key: &[u8],
) -> Result<Lookup, TableError> {
    let oldest = max_index - run_count as i64 + 1;
    let mut index = max_index;
    while index >= oldest {
        match search(dir, index, key)? {
            Lookup::Miss => index -= 1,
            outcome => return Ok(outcome),
        }
    }
    Ok(Lookup::Miss)
}

fn scan_sparse(dir: &Path, prefix: &str, key: &[u8]) -> Result<SparseScan, TableError> {
    let file = File::open(file_path(dir, prefix, SPARSE_FILE))?;
    let mut reader = BufReader::new(file);

    let mut from: Option<u64> = None;
    while let Some((k, dense_offset)) = format::read_index_entry(&mut reader)? {
        match k.as_slice().cmp(key) {
            // the dense entry at this offset is the key itself
            Ordering::Equal => return Ok(SparseScan::Scan { from: dense_offset, to: None }),
            Ordering::Less => from = Some(dense_offset),
            Ordering::Greater => {
                return Ok(match from {
                    None => SparseScan::Miss,
                    Some(from) => SparseScan::Scan { from, to: Some(dense_offset) },
                });
            }
        }
    }
    Ok(match from {
        None => SparseScan::Miss,
        Some(from) => SparseScan::Scan { from, to: None },
    })
}

fn scan_dense(
    dir: &Path,
    prefix: &str,
    key: &[u8],
    from: u64,
    to: Option<u64>,
) -> Result<Option<u64>, TableError> {
    let mut file = File::open(file_path(dir, prefix, INDEX_FILE))?;
    file.seek(SeekFrom::Start(from))?;
    let mut reader = BufReader::new(file);

    let mut pos = from;
    loop {
        if let Some(to) = to {
            if pos >= to {
                return Ok(None);
            }
        }
        match format::read_index_entry(&mut reader)? {
            None => return Ok(None),
            Some((k, data_offset)) => {
                if k.as_slice() == key {
                    return Ok(Some(data_offset));
                }
                // frame_len + key_len + key + 8-byte offset value
                pos += (3 * format::INT_BYTES + k.len()) as u64;
            }
        }
    }
}

fn read_data(dir: &Path, prefix: &str, key: &[u8], offset: u64) -> Result<Lookup, TableError> {
    let mut file = File::open(file_path(dir, prefix, DATA_FILE))?;
    file.seek(SeekFrom::Start(offset))?;

    match format::read_record(&mut BufReader::new(file))? {
        None => Err(TableError::Corruption("dense index points past the data file")),
        Some((k, _)) if k != key => Err(TableError::Corruption("dense index points at the wrong key")),
        Some((_, Some(value))) => Ok(Lookup::Hit(value)),
        Some((_, None)) => Ok(Lookup::Tombstone),
    }
}
