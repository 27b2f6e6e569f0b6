//! Pairwise compaction of two adjacent runs.
//!
//! The output is written under the transient `merge-` prefix and only
//! renamed to the surviving run's prefix after both inputs are deleted:
//! fsync output, delete inputs, rename. A crash before the deletions
//! leaves the inputs intact plus orphan `merge-*` files, which
//! [`remove_stale_merge`] clears on the next open; a crash after the
//! rename has already completed the merge.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::iter::TableIter;
use crate::writer::TableWriter;
use crate::{file_path, table_prefix, TableError, DATA_FILE, INDEX_FILE, MERGE_PREFIX, SPARSE_FILE};

/// Merges adjacent runs `a` and `b = a + 1` (with `a` older) into a single
/// run that takes over index `b`. The inputs are removed.
///
/// Records merge with newer-wins semantics: on equal keys, `b`'s record is
/// emitted and `a`'s dropped. Tombstones pass through like values, so a
/// deletion keeps shadowing runs older than the merged pair.
pub fn merge_tables(
    dir: &Path,
    a: i64,
    b: i64,
    sparse_key_distance: u64,
) -> Result<(), TableError> {
    let mut a_it = TableIter::open(dir, a)?;
    let mut b_it = TableIter::open(dir, b)?;

    let mut writer = TableWriter::create(dir, MERGE_PREFIX, sparse_key_distance)?;
    merge_into(&mut a_it, &mut b_it, &mut writer)?;
    writer.sync()?;
    drop(writer);
    drop(a_it);
    drop(b_it);

    remove_table(dir, &table_prefix(a))?;
    remove_table(dir, &table_prefix(b))?;
    rename_table(dir, MERGE_PREFIX, &table_prefix(b))?;
    Ok(())
}

/// Two-pointer merge over the heads of both data-file iterators.
fn merge_into(
    a: &mut TableIter,
    b: &mut TableIter,
    out: &mut TableWriter,
) -> Result<(), TableError> {
    loop {
        let order = match (a.peek(), b.peek()) {
            (None, None) => return Ok(()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((a_key, _)), Some((b_key, _))) => a_key.cmp(b_key),
        };
        match order {
            Ordering::Less => emit_head(a, out)?,
            Ordering::Greater => emit_head(b, out)?,
            Ordering::Equal => {
                // equal keys: b is newer, a's record is superseded
                advance(a)?;
                emit_head(b, out)?;
            }
        }
    }
}

fn emit_head(it: &mut TableIter, out: &mut TableWriter) -> Result<(), TableError> {
    if let Some(result) = it.next() {
        let (key, value) = result?;
        out.write(&key, value.as_deref())?;
    }
    Ok(())
}

fn advance(it: &mut TableIter) -> Result<(), TableError> {
    if let Some(result) = it.next() {
        result?;
    }
    Ok(())
}

/// Removes any `merge-*` files a crashed compaction left behind. Called
/// once when the engine opens a directory. Returns how many files were
/// removed.
pub fn remove_stale_merge(dir: &Path) -> Result<usize, TableError> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(MERGE_PREFIX) {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn remove_table(dir: &Path, prefix: &str) -> Result<(), TableError> {
    for name in [DATA_FILE, INDEX_FILE, SPARSE_FILE] {
        fs::remove_file(file_path(dir, prefix, name))?;
    }
    Ok(())
}

fn rename_table(dir: &Path, from: &str, to: &str) -> Result<(), TableError> {
    for name in [DATA_FILE, INDEX_FILE, SPARSE_FILE] {
        fs::rename(file_path(dir, from, name), file_path(dir, to, name))?;
    }
    Ok(())
}
