//! Run-set metadata: `(run_count, max_index)` persisted in `meta.db`.
//!
//! `max_index` is the largest run index ever assigned, `-1` before the
//! first flush, stored as its two's-complement u64. The live runs are the
//! contiguous window `max_index - run_count + 1 ..= max_index`.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use crate::Result;

pub(crate) const META_FILE: &str = "meta.db";
const META_TMP_FILE: &str = "meta.db.tmp";

/// Loads `(run_count, max_index)`; a missing file reads as `(0, -1)`.
pub(crate) fn load(dir: &Path) -> Result<(usize, i64)> {
    let file = match File::open(dir.join(META_FILE)) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((0, -1)),
        Err(e) => return Err(e.into()),
    };
    let (run_count, max_index) = format::read_u64_pair(&mut BufReader::new(file))?;
    Ok((run_count as usize, max_index as i64))
}

/// Persists `(run_count, max_index)` atomically: the pair is written to a
/// temporary file, fsynced, and renamed over `meta.db`.
pub(crate) fn store(dir: &Path, run_count: usize, max_index: i64) -> Result<()> {
    let tmp = dir.join(META_TMP_FILE);
    let mut file = File::create(&tmp)?;
    format::write_u64_pair(&mut file, run_count as u64, max_index as u64)?;
    file.sync_all()?;
    fs::rename(&tmp, dir.join(META_FILE))?;
    Ok(())
}
