//! Record framing shared by every SiltKV on-disk file.
//!
//! The WAL, the data file of a sorted run, and both of its index files all
//! use the same frame:
//!
//! ```text
//! [frame_len: u64 BE][key_len: u64 BE][key bytes][value bytes]
//! ```
//!
//! `frame_len = 8 + key_len + value_len`, so a reader pulls one 8-byte
//! length and then exactly that many bytes. A tombstone is a record with a
//! zero-length value, detected as `8 + key_len == frame_len`. Index files
//! reuse the frame with an 8-byte big-endian file offset in the value slot.
//!
//! `meta.db` uses a second, fixed 16-byte layout: two u64 BE values.
//!
//! All integers are big-endian. Reads use read-exact semantics: a stream
//! that ends anywhere inside a frame is corruption, and only end-of-stream
//! on the very first byte of `frame_len` counts as a clean EOF.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Width of every on-disk integer, in bytes.
pub const INT_BYTES: usize = 8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt record: {0}")]
    Corruption(&'static str),
}

/// Writes one framed record. `value: None` encodes a tombstone.
///
/// Returns the total number of bytes written, including the `frame_len`
/// field itself.
pub fn write_record<W: Write>(
    w: &mut W,
    key: &[u8],
    value: Option<&[u8]>,
) -> Result<u64, CodecError> {
    let value = value.unwrap_or_default();
    let frame_len = (INT_BYTES + key.len() + value.len()) as u64;

    w.write_u64::<BigEndian>(frame_len)?;
    w.write_u64::<BigEndian>(key.len() as u64)?;
    w.write_all(key)?;
    w.write_all(value)?;

    Ok(INT_BYTES as u64 + frame_len)
}

/// Reads one framed record.
///
/// Returns `Ok(None)` on a clean EOF, i.e. when the stream ends before the
/// first byte of `frame_len`. The value is `None` for tombstones. A stream
/// that ends anywhere else inside the frame yields
/// [`CodecError::Corruption`].
pub fn read_record<R: Read>(r: &mut R) -> Result<Option<(Vec<u8>, Option<Vec<u8>>)>, CodecError> {
    let frame_len = match read_frame_len(r)? {
        Some(n) => n as usize,
        None => return Ok(None),
    };
    if frame_len < INT_BYTES {
        return Err(CodecError::Corruption("frame shorter than its key length field"));
    }

    let mut frame = vec![0u8; frame_len];
    r.read_exact(&mut frame).map_err(truncated)?;

    let key_len = BigEndian::read_u64(&frame[..INT_BYTES]) as usize;
    let key_end = match INT_BYTES.checked_add(key_len) {
        Some(end) if end <= frame_len => end,
        _ => return Err(CodecError::Corruption("key length exceeds frame")),
    };

    let key = frame[INT_BYTES..key_end].to_vec();
    if key_end == frame_len {
        return Ok(Some((key, None)));
    }
    Ok(Some((key, Some(frame[key_end..].to_vec()))))
}

/// Writes an index entry: a record whose value is the 8-byte BE `offset`.
///
/// Returns the number of bytes written.
pub fn write_index_entry<W: Write>(
    w: &mut W,
    key: &[u8],
    offset: u64,
) -> Result<u64, CodecError> {
    write_record(w, key, Some(&offset.to_be_bytes()))
}

/// Reads an index entry, decoding the value slot back into a file offset.
///
/// Returns `Ok(None)` on a clean EOF. A record whose value is missing or
/// not exactly 8 bytes is corruption.
pub fn read_index_entry<R: Read>(r: &mut R) -> Result<Option<(Vec<u8>, u64)>, CodecError> {
    match read_record(r)? {
        None => Ok(None),
        Some((key, Some(value))) if value.len() == INT_BYTES => {
            Ok(Some((key, BigEndian::read_u64(&value))))
        }
        Some(_) => Err(CodecError::Corruption("index entry value is not an offset")),
    }
}

/// Writes the fixed 16-byte pair layout used by `meta.db`.
pub fn write_u64_pair<W: Write>(w: &mut W, x: u64, y: u64) -> Result<(), CodecError> {
    w.write_u64::<BigEndian>(x)?;
    w.write_u64::<BigEndian>(y)?;
    Ok(())
}

/// Reads the fixed 16-byte pair layout used by `meta.db`.
pub fn read_u64_pair<R: Read>(r: &mut R) -> Result<(u64, u64), CodecError> {
    let x = r.read_u64::<BigEndian>().map_err(truncated)?;
    let y = r.read_u64::<BigEndian>().map_err(truncated)?;
    Ok((x, y))
}

/// Reads the leading `frame_len` field, distinguishing a clean EOF (no
/// bytes available at all) from a torn length field.
fn read_frame_len<R: Read>(r: &mut R) -> Result<Option<u64>, CodecError> {
    let mut buf = [0u8; INT_BYTES];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(CodecError::Corruption("truncated frame length")),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(Some(BigEndian::read_u64(&buf)))
}

fn truncated(e: io::Error) -> CodecError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::Corruption("truncated frame")
    } else {
        CodecError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(key: &[u8], value: Option<&[u8]>) -> (Vec<u8>, Option<Vec<u8>>) {
        let mut buf = Vec::new();
        write_record(&mut buf, key, value).unwrap();
        read_record(&mut Cursor::new(buf)).unwrap().unwrap()
    }

    // -------------------- Record roundtrips --------------------

    #[test]
    fn record_roundtrip() {
        let (k, v) = roundtrip(b"key", Some(b"value"));
        assert_eq!(k, b"key");
        assert_eq!(v.as_deref(), Some(b"value".as_slice()));
    }

    #[test]
    fn tombstone_roundtrip() {
        let (k, v) = roundtrip(b"gone", None);
        assert_eq!(k, b"gone");
        assert!(v.is_none());
    }

    #[test]
    fn binary_key_and_value_roundtrip() {
        let key = vec![0x00, 0xFF, 0x80];
        let value = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let (k, v) = roundtrip(&key, Some(&value));
        assert_eq!(k, key);
        assert_eq!(v, Some(value));
    }

    #[test]
    fn max_length_key_and_value_roundtrip() {
        let key = vec![b'k'; 65535];
        let value = vec![b'v'; 65535];
        let (k, v) = roundtrip(&key, Some(&value));
        assert_eq!(k.len(), 65535);
        assert_eq!(v.unwrap().len(), 65535);
    }

    #[test]
    fn bytes_written_matches_layout() {
        let mut buf = Vec::new();
        let n = write_record(&mut buf, b"ab", Some(b"cde")).unwrap();
        // frame_len(8) + key_len(8) + key(2) + value(3)
        assert_eq!(n, 21);
        assert_eq!(buf.len(), 21);
        // frame_len field excludes itself
        assert_eq!(&buf[..8], &13u64.to_be_bytes());
    }

    #[test]
    fn records_read_back_in_sequence() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"a", Some(b"1")).unwrap();
        write_record(&mut buf, b"b", None).unwrap();
        write_record(&mut buf, b"c", Some(b"3")).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(
            read_record(&mut cur).unwrap(),
            Some((b"a".to_vec(), Some(b"1".to_vec())))
        );
        assert_eq!(read_record(&mut cur).unwrap(), Some((b"b".to_vec(), None)));
        assert_eq!(
            read_record(&mut cur).unwrap(),
            Some((b"c".to_vec(), Some(b"3".to_vec())))
        );
        assert_eq!(read_record(&mut cur).unwrap(), None);
    }

    // -------------------- EOF and corruption --------------------

    #[test]
    fn empty_stream_is_clean_eof() {
        assert_eq!(read_record(&mut Cursor::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn torn_frame_length_is_corruption() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"k", Some(b"v")).unwrap();
        buf.truncate(5); // inside the frame_len field
        assert!(matches!(
            read_record(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }

    #[test]
    fn truncated_frame_body_is_corruption() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"key", Some(b"value")).unwrap();
        buf.truncate(buf.len() - 2);
        assert!(matches!(
            read_record(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }

    #[test]
    fn key_length_past_frame_is_corruption() {
        let mut buf = Vec::new();
        // frame_len = 10, but key_len claims 100
        buf.extend_from_slice(&10u64.to_be_bytes());
        buf.extend_from_slice(&100u64.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        assert!(matches!(
            read_record(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }

    #[test]
    fn frame_shorter_than_key_length_field_is_corruption() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u64.to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            read_record(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }

    // -------------------- Index entries --------------------

    #[test]
    fn index_entry_roundtrip() {
        let mut buf = Vec::new();
        write_index_entry(&mut buf, b"key", 4096).unwrap();
        let (k, offset) = read_index_entry(&mut Cursor::new(buf)).unwrap().unwrap();
        assert_eq!(k, b"key");
        assert_eq!(offset, 4096);
    }

    #[test]
    fn index_entry_with_tombstone_value_is_corruption() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"key", None).unwrap();
        assert!(matches!(
            read_index_entry(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }

    #[test]
    fn index_entry_with_short_value_is_corruption() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"key", Some(b"off")).unwrap();
        assert!(matches!(
            read_index_entry(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }

    // -------------------- Integer pairs --------------------

    #[test]
    fn u64_pair_roundtrip() {
        let mut buf = Vec::new();
        write_u64_pair(&mut buf, 7, 42).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(read_u64_pair(&mut Cursor::new(buf)).unwrap(), (7, 42));
    }

    #[test]
    fn u64_pair_carries_negative_index_as_twos_complement() {
        let mut buf = Vec::new();
        write_u64_pair(&mut buf, 0, -1i64 as u64).unwrap();
        let (count, max) = read_u64_pair(&mut Cursor::new(buf)).unwrap();
        assert_eq!(count, 0);
        assert_eq!(max as i64, -1);
    }

    #[test]
    fn short_pair_is_corruption() {
        let buf = vec![0u8; 12];
        assert!(matches!(
            read_u64_pair(&mut Cursor::new(buf)),
            Err(CodecError::Corruption(_))
        ));
    }
}
