use memtable::Memtable;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::{file_path, table_prefix, TableError, DATA_FILE, INDEX_FILE, SPARSE_FILE};

/// Streams records into the three files of a new run.
///
/// The writer tracks `(data_pos, index_pos, keys_written)` as it goes: each
/// record lands in the data file, its dense entry records the data offset,
/// and every `sparse_key_distance`th key also lands in the sparse index
/// with its dense offset. The first key of a run is always sparse-indexed.
///
/// The caller must provide keys in strictly ascending order; a run never
/// contains duplicate keys.
pub struct TableWriter {
    data: File,
    index: File,
    sparse: File,
    data_pos: u64,
    index_pos: u64,
    keys_written: u64,
    sparse_key_distance: u64,
}

impl TableWriter {
    /// Creates (truncating) the three files `{prefix}data.db`,
    /// `{prefix}index.db` and `{prefix}sparse.db` under `dir`.
    pub fn create(dir: &Path, prefix: &str, sparse_key_distance: u64) -> Result<Self, TableError> {
        let open = |name: &str| -> io::Result<File> {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(file_path(dir, prefix, name))
        };
        Ok(Self {
            data: open(DATA_FILE)?,
            index: open(INDEX_FILE)?,
            sparse: open(SPARSE_FILE)?,
            data_pos: 0,
            index_pos: 0,
            keys_written: 0,
            sparse_key_distance,
        })
    }

    /// Appends one record; `value: None` writes a tombstone.
    pub fn write(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<(), TableError> {
        let data_pos = self.data_pos;
        self.data_pos += format::write_record(&mut self.data, key, value)?;

        let index_pos = self.index_pos;
        self.index_pos += format::write_index_entry(&mut self.index, key, data_pos)?;

        // distance 0 degenerates to a fully dense sparse index
        if self.sparse_key_distance == 0 || self.keys_written % self.sparse_key_distance == 0 {
            format::write_index_entry(&mut self.sparse, key, index_pos)?;
        }
        self.keys_written += 1;
        Ok(())
    }

    /// Fsyncs all three files. The handles close on drop.
    pub fn sync(&mut self) -> Result<(), TableError> {
        self.data.sync_all()?;
        self.index.sync_all()?;
        self.sparse.sync_all()?;
        Ok(())
    }
}

/// Flushes a memtable to a new run with the given index.
///
/// Writes under the `"{index}-"` prefix in ascending key order, tombstones
/// included, and fsyncs the run before returning. The caller persists the
/// run-set metadata afterwards; a crash in between leaves files the next
/// flush simply overwrites.
pub fn flush_memtable(
    dir: &Path,
    index: i64,
    sparse_key_distance: u64,
    memtable: &Memtable,
) -> Result<(), TableError> {
    let prefix = table_prefix(index);
    let mut writer = TableWriter::create(dir, &prefix, sparse_key_distance)?;
    for (key, value) in memtable.iter() {
        writer.write(key, value)?;
    }
    writer.sync()
}
