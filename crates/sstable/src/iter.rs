use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{file_path, table_prefix, TableError, DATA_FILE};

/// Sequential iteration over a run's data file.
///
/// The iterator owns the file handle; dropping it closes the file. One
/// record is read ahead so the merge can compare the heads of two runs
/// without consuming them.
pub struct TableIter {
    reader: BufReader<File>,
    head: Option<(Vec<u8>, Option<Vec<u8>>)>,
}

impl TableIter {
    /// Opens the data file of run `index` and reads the first record.
    pub fn open(dir: &Path, index: i64) -> Result<Self, TableError> {
        let file = File::open(file_path(dir, &table_prefix(index), DATA_FILE))?;
        let mut reader = BufReader::new(file);
        let head = format::read_record(&mut reader)?;
        Ok(Self { reader, head })
    }

    /// Returns the record the next `next()` call would yield.
    pub fn peek(&self) -> Option<&(Vec<u8>, Option<Vec<u8>>)> {
        self.head.as_ref()
    }
}

impl Iterator for TableIter {
    type Item = Result<(Vec<u8>, Option<Vec<u8>>), TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.head.take()?;
        match format::read_record(&mut self.reader) {
            Ok(head) => {
                self.head = head;
                Some(Ok(current))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}
