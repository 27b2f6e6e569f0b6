use std::io;
use thiserror::Error;

use crate::{MAX_KEY_BYTES, MAX_VALUE_BYTES};

/// Errors surfaced by the engine API.
///
/// Validation errors leave the store untouched. An `Io` error from a
/// mutation is ambiguous: the WAL append may or may not have become
/// durable, so a retry is only safe for idempotent payloads.
#[derive(Debug, Error)]
pub enum Error {
    #[error("key is required")]
    KeyRequired,
    #[error("value is required")]
    ValueRequired,
    #[error("key exceeds {MAX_KEY_BYTES} bytes")]
    KeyTooLarge,
    #[error("value exceeds {MAX_VALUE_BYTES} bytes")]
    ValueTooLarge,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<format::CodecError> for Error {
    fn from(e: format::CodecError) -> Self {
        match e {
            format::CodecError::Io(e) => Error::Io(e),
            format::CodecError::Corruption(msg) => Error::Corruption(msg.to_string()),
        }
    }
}

impl From<wal::WalError> for Error {
    fn from(e: wal::WalError) -> Self {
        match e {
            wal::WalError::Io(e) => Error::Io(e),
            wal::WalError::Codec(e) => e.into(),
        }
    }
}

impl From<sstable::TableError> for Error {
    fn from(e: sstable::TableError) -> Self {
        match e {
            sstable::TableError::Io(e) => Error::Io(e),
            sstable::TableError::Codec(e) => e.into(),
            sstable::TableError::Corruption(msg) => Error::Corruption(msg.to_string()),
        }
    }
}
