//! # Write-ahead log
//!
//! An append-only record of every memtable mutation, fsynced before the
//! mutation is acknowledged. On open the engine replays the log to rebuild
//! the memtable it backed; after a flush the log is rotated (truncated in
//! place), because its contents now live in a sorted run.
//!
//! One WAL file backs exactly one memtable generation. Records use the
//! shared framing from the [`format`] crate; a delete is appended as a
//! tombstone (no value bytes).

use format::CodecError;
use memtable::Memtable;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A write-ahead log with one long-lived read-write handle.
///
/// The handle stays open for the life of the engine; `append` seeks to the
/// end before writing, so a `load` that moved the cursor never corrupts
/// the tail.
pub struct Wal {
    path: PathBuf,
    file: File,
}

impl Wal {
    /// Opens the log at `path`, creating it if absent. Existing contents
    /// are preserved for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// Appends one record and fsyncs before returning.
    ///
    /// `value: None` records a delete. Once this returns `Ok` the mutation
    /// survives a crash.
    pub fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<(), WalError> {
        self.file.seek(SeekFrom::End(0))?;
        format::write_record(&mut self.file, key, value)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Replays the log from the start into a fresh memtable.
    ///
    /// A stream that ends cleanly at any record boundary yields the
    /// memtable built so far; a stream that ends mid-record is corruption.
    pub fn load(&mut self) -> Result<Memtable, WalError> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        let mut memtable = Memtable::new();
        while let Some((key, value)) = format::read_record(&mut reader)? {
            match value {
                Some(value) => memtable.put(key, value),
                None => memtable.delete(key),
            }
        }
        Ok(memtable)
    }

    /// Closes the current log and reopens it truncated.
    ///
    /// Called after a flush: the records are now durable in a sorted run,
    /// so the next memtable generation starts from an empty log.
    pub fn rotate(&mut self) -> Result<(), WalError> {
        self.file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn append_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");

        let mut wal = Wal::open(&path).unwrap();
        wal.append(b"k", Some(b"v1")).unwrap();
        wal.append(b"k2", Some(b"v2")).unwrap();
        wal.append(b"k", None).unwrap();

        let m = wal.load().unwrap();
        assert_eq!(m.get(b"k"), Some(None)); // delete replayed last
        assert_eq!(m.get(b"k2"), Some(Some(b"v2".as_slice())));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn load_empty_log_yields_empty_memtable() {
        let dir = tempdir().unwrap();
        let mut wal = Wal::open(dir.path().join("wal.db")).unwrap();
        let m = wal.load().unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn replay_applies_overwrites_in_order() {
        let dir = tempdir().unwrap();
        let mut wal = Wal::open(dir.path().join("wal.db")).unwrap();
        wal.append(b"k", Some(b"old")).unwrap();
        wal.append(b"k", Some(b"new")).unwrap();

        let m = wal.load().unwrap();
        assert_eq!(m.get(b"k"), Some(Some(b"new".as_slice())));
        assert_eq!(m.size_bytes(), 1 + 3);
    }

    #[test]
    fn append_after_load_lands_at_the_end() {
        let dir = tempdir().unwrap();
        let mut wal = Wal::open(dir.path().join("wal.db")).unwrap();
        wal.append(b"a", Some(b"1")).unwrap();
        wal.load().unwrap(); // moves the cursor to the front
        wal.append(b"b", Some(b"2")).unwrap();

        let m = wal.load().unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(b"a"), Some(Some(b"1".as_slice())));
        assert_eq!(m.get(b"b"), Some(Some(b"2".as_slice())));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(b"k", Some(b"v")).unwrap();
            wal.append(b"dead", None).unwrap();
        }

        let mut wal = Wal::open(&path).unwrap();
        let m = wal.load().unwrap();
        assert_eq!(m.get(b"k"), Some(Some(b"v".as_slice())));
        assert_eq!(m.get(b"dead"), Some(None));
    }

    #[test]
    fn rotate_truncates_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");

        let mut wal = Wal::open(&path).unwrap();
        wal.append(b"k", Some(b"v")).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0);

        wal.rotate().unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert!(wal.load().unwrap().is_empty());

        // the rotated log accepts new appends
        wal.append(b"k2", Some(b"v2")).unwrap();
        let m = wal.load().unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(b"k2"), Some(Some(b"v2".as_slice())));
    }

    #[test]
    fn truncated_tail_is_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(b"key", Some(b"value")).unwrap();
        }
        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..full.len() - 3]).unwrap();

        let mut wal = Wal::open(&path).unwrap();
        assert!(matches!(
            wal.load(),
            Err(WalError::Codec(CodecError::Corruption(_)))
        ));
    }
}
