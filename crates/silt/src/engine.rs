use log::{debug, info, warn};
use memtable::Memtable;
use sstable::Lookup;
use std::io;
use std::path::{Path, PathBuf};
use wal::Wal;

use crate::options::Options;
use crate::{meta, Error, Result, MAX_KEY_BYTES, MAX_VALUE_BYTES};

/// WAL file name inside the store directory.
pub const WAL_FILE: &str = "wal.db";

/// An embedded LSM-tree key-value store over a single directory.
///
/// The tree owns one long-lived WAL handle, the live memtable, and the
/// `(run_count, max_index)` run-set window. Sorted-run files are opened
/// per operation and closed before it returns.
///
/// Every mutation is fsynced into the WAL before it touches the memtable,
/// so an acknowledged `put` or `delete` survives a crash; reopening the
/// directory replays the WAL into an equivalent memtable.
pub struct LsmTree {
    dir: PathBuf,
    wal: Wal,
    memtable: Memtable,
    run_count: usize,
    max_index: i64,
    options: Options,
}

impl LsmTree {
    /// Opens the store in `dir`, which must be an existing directory.
    ///
    /// Recovery order: stale `merge-*` files from a crashed compaction
    /// are removed, the WAL is replayed into a fresh memtable, and the
    /// run-set window is read from `meta.db` (absent means no runs).
    pub fn open<P: AsRef<Path>>(dir: P, options: Options) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("store directory {} does not exist", dir.display()),
            )));
        }

        let stale = sstable::remove_stale_merge(&dir)?;
        if stale > 0 {
            warn!("removed {stale} stale merge files left by a crashed compaction");
        }

        let mut wal = Wal::open(dir.join(WAL_FILE))?;
        let memtable = wal.load()?;
        let (run_count, max_index) = meta::load(&dir)?;

        debug!(
            "opened {}: {} runs up to index {}, {} bytes replayed into the memtable",
            dir.display(),
            run_count,
            max_index,
            memtable.size_bytes()
        );

        Ok(Self {
            dir,
            wal,
            memtable,
            run_count,
            max_index,
            options,
        })
    }

    /// Stores `value` under `key`.
    ///
    /// The record is fsynced into the WAL before the memtable changes.
    /// May flush the memtable and then compact the two oldest runs when
    /// the respective thresholds are crossed.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyRequired);
        }
        if key.len() > MAX_KEY_BYTES {
            return Err(Error::KeyTooLarge);
        }
        if value.is_empty() {
            return Err(Error::ValueRequired);
        }
        if value.len() > MAX_VALUE_BYTES {
            return Err(Error::ValueTooLarge);
        }

        self.wal.append(key, Some(value))?;
        self.memtable.put(key.to_vec(), value.to_vec());

        if self.memtable.size_bytes() > self.options.memtable_size_bytes {
            self.flush()?;
        }
        if self.run_count > self.options.runs_max {
            self.compact()?;
        }
        Ok(())
    }

    /// Marks `key` deleted.
    ///
    /// Appends a tombstone to the WAL and the memtable. Deletes do not
    /// trigger a flush or compaction; the next `put` does.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyRequired);
        }
        if key.len() > MAX_KEY_BYTES {
            return Err(Error::KeyTooLarge);
        }

        self.wal.append(key, None)?;
        self.memtable.delete(key.to_vec());
        Ok(())
    }

    /// Looks up `key`, returning `None` when it is absent or deleted.
    ///
    /// The memtable answers first; otherwise the runs are probed from
    /// newest to oldest. A tombstone anywhere on that path means absent:
    /// it shadows any older value below it.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.map(<[u8]>::to_vec));
        }
        match sstable::search_run_set(&self.dir, self.max_index, self.run_count, key)? {
            Lookup::Hit(value) => Ok(Some(value)),
            Lookup::Tombstone | Lookup::Miss => Ok(None),
        }
    }

    /// Closes the store, dropping the WAL handle.
    ///
    /// Every acknowledged mutation is already durable; this exists so
    /// callers can release the directory at a deliberate point.
    pub fn close(self) {}

    /// Writes the memtable out as run `max_index + 1`.
    ///
    /// Order matters for crash safety: the run is fsynced, the metadata
    /// window is persisted, and only then is the WAL truncated and the
    /// memtable cleared. A crash before the metadata store leaves an
    /// orphan run the next flush overwrites; a crash after it replays an
    /// already-flushed WAL, which is harmless.
    fn flush(&mut self) -> Result<()> {
        let new_index = self.max_index + 1;
        sstable::flush_memtable(
            &self.dir,
            new_index,
            self.options.sparse_key_distance,
            &self.memtable,
        )?;
        meta::store(&self.dir, self.run_count + 1, new_index)?;
        self.wal.rotate()?;
        self.memtable.clear();
        self.run_count += 1;
        self.max_index = new_index;

        info!(
            "flushed memtable to run {new_index} ({} runs live)",
            self.run_count
        );
        Ok(())
    }

    /// Merges the two oldest runs into one, shrinking the window by one.
    fn compact(&mut self) -> Result<()> {
        let oldest = self.max_index - self.run_count as i64 + 1;
        sstable::merge_tables(
            &self.dir,
            oldest,
            oldest + 1,
            self.options.sparse_key_distance,
        )?;
        meta::store(&self.dir, self.run_count - 1, self.max_index)?;
        self.run_count -= 1;

        info!(
            "compacted runs {oldest} and {} ({} runs live)",
            oldest + 1,
            self.run_count
        );
        Ok(())
    }
}
