//! Whole-image RDB parsing: magic header, aux preamble, database sections.

use std::collections::HashMap;

use jiff::Timestamp;
use tokio::io;

use crate::rdb::encoding::take;
use crate::rdb::opcode::{Record, read_record};

const MAGIC: &[u8] = b"REDIS";

#[derive(Debug, Clone, PartialEq)]
pub struct RdbEntry {
    pub key: String,
    pub value: String,
    pub expires_at: Option<Timestamp>,
}

/// The decoded content of an RDB image.
#[derive(Debug, Default, PartialEq)]
pub struct RdbSnapshot {
    pub version: String,
    pub aux: HashMap<String, String>,
    pub entries: Vec<RdbEntry>,
}

/// Parses a complete RDB image held in memory.
///
/// The layout is the magic string `REDIS` and a 4-byte version, an aux
/// preamble, then per-database sections of key/value records until the
/// end-of-file opcode.
pub fn parse_rdb(bytes: &[u8]) -> io::Result<RdbSnapshot> {
    let magic = take(bytes, 0, MAGIC.len())?;
    if magic != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing REDIS magic string",
        ));
    }

    let version_raw = take(bytes, MAGIC.len(), 4)?;
    let version = String::from_utf8(version_raw.to_vec())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid RDB version bytes"))?;

    let mut snapshot = RdbSnapshot {
        version,
        ..RdbSnapshot::default()
    };

    let mut cursor = MAGIC.len() + 4;

    while cursor < bytes.len() {
        let (record, consumed) = read_record(bytes, cursor)?;
        cursor += consumed;

        match record {
            Record::Aux { key, value } => {
                snapshot.aux.insert(key, value);
            }
            Record::SelectDb { .. } | Record::ResizeDb { .. } => {}
            Record::KeyValue {
                key,
                value,
                expires_at,
            } => {
                snapshot.entries.push(RdbEntry {
                    key,
                    value,
                    expires_at,
                });
            }
            Record::EndOfFile => break,
        }
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::parse_rdb;
    use crate::rdb::EMPTY_RDB;

    fn sample_rdb() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"REDIS0011");
        // aux: redis-ver 7.2.0
        bytes.push(0xFA);
        bytes.extend_from_slice(b"\x09redis-ver\x057.2.0");
        // db 0 with a resize hint
        bytes.push(0xFE);
        bytes.push(0x00);
        bytes.push(0xFB);
        bytes.push(0x02);
        bytes.push(0x01);
        // plain string record
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x03foo\x03bar");
        // record with a millisecond expiry
        bytes.push(0xFC);
        bytes.extend_from_slice(&33_177_117_420_000u64.to_le_bytes());
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x07expires\x04soon");
        // end of file + checksum
        bytes.push(0xFF);
        bytes.extend_from_slice(&[0; 8]);

        bytes
    }

    #[test]
    fn test_parse_sample_rdb() {
        let snapshot = parse_rdb(&sample_rdb()).unwrap();

        assert_eq!(snapshot.version, "0011");
        assert_eq!(snapshot.aux.get("redis-ver"), Some(&"7.2.0".to_string()));
        assert_eq!(snapshot.entries.len(), 2);

        assert_eq!(snapshot.entries[0].key, "foo");
        assert_eq!(snapshot.entries[0].value, "bar");
        assert_eq!(snapshot.entries[0].expires_at, None);

        assert_eq!(snapshot.entries[1].key, "expires");
        assert_eq!(snapshot.entries[1].value, "soon");
        assert_eq!(
            snapshot.entries[1].expires_at.unwrap().as_millisecond(),
            33_177_117_420_000i64
        );
    }

    #[test]
    fn test_parse_canonical_empty_rdb() {
        let snapshot = parse_rdb(&EMPTY_RDB).unwrap();

        assert_eq!(snapshot.version, "0011");
        assert_eq!(snapshot.entries, Vec::new());
        assert_eq!(snapshot.aux.get("redis-ver"), Some(&"7.2.0".to_string()));
        assert_eq!(snapshot.aux.get("redis-bits"), Some(&"64".to_string()));
        assert_eq!(snapshot.aux.get("aof-base"), Some(&"0".to_string()));
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let result = parse_rdb(b"RUDIS0011");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_image() {
        let mut bytes = sample_rdb();
        bytes.truncate(bytes.len() - 4);

        assert!(parse_rdb(&bytes).is_err());
    }
}
