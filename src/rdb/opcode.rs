//! RDB record framing: one opcode (or value-type byte) per record.

use jiff::Timestamp;
use tokio::io;

use crate::rdb::encoding::{read_length, read_string, take};

const AUX: u8 = 0xFA;
const RESIZEDB: u8 = 0xFB;
const EXPIRETIME_MS: u8 = 0xFC;
const EXPIRETIME: u8 = 0xFD;
const SELECTDB: u8 = 0xFE;
const END_OF_FILE: u8 = 0xFF;
const TYPE_STRING: u8 = 0x00;

#[derive(Debug, PartialEq)]
pub(crate) enum Record {
    Aux {
        key: String,
        value: String,
    },
    SelectDb {
        index: usize,
    },
    ResizeDb {
        hash_table_size: usize,
        expiry_table_size: usize,
    },
    KeyValue {
        key: String,
        value: String,
        expires_at: Option<Timestamp>,
    },
    EndOfFile,
}

/// Reads one record starting at `cursor`. Returns the record and the number
/// of bytes consumed.
pub(crate) fn read_record(bytes: &[u8], cursor: usize) -> io::Result<(Record, usize)> {
    let opcode = take(bytes, cursor, 1)?[0];
    let mut offset = cursor + 1;

    let record = match opcode {
        AUX => {
            let (key, consumed) = read_string(bytes, offset)?;
            offset += consumed;
            let (value, consumed) = read_string(bytes, offset)?;
            offset += consumed;

            Record::Aux { key, value }
        }
        SELECTDB => {
            let (index, consumed) = read_length(bytes, offset)?;
            offset += consumed;

            Record::SelectDb { index }
        }
        RESIZEDB => {
            let (hash_table_size, consumed) = read_length(bytes, offset)?;
            offset += consumed;
            let (expiry_table_size, consumed) = read_length(bytes, offset)?;
            offset += consumed;

            Record::ResizeDb {
                hash_table_size,
                expiry_table_size,
            }
        }
        EXPIRETIME => {
            let raw: [u8; 4] = take(bytes, offset, 4)?.try_into().unwrap_or_default();
            offset += 4;

            let seconds = u32::from_le_bytes(raw);
            let expires_at = Timestamp::from_second(seconds as i64)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

            let (key, value, consumed) = read_typed_value(bytes, offset)?;
            offset += consumed;

            Record::KeyValue {
                key,
                value,
                expires_at: Some(expires_at),
            }
        }
        EXPIRETIME_MS => {
            let raw: [u8; 8] = take(bytes, offset, 8)?.try_into().unwrap_or_default();
            offset += 8;

            let millis = u64::from_le_bytes(raw);
            let expires_at = Timestamp::from_millisecond(millis as i64)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

            let (key, value, consumed) = read_typed_value(bytes, offset)?;
            offset += consumed;

            Record::KeyValue {
                key,
                value,
                expires_at: Some(expires_at),
            }
        }
        END_OF_FILE => {
            // 8-byte CRC64 checksum follows; read and ignore it.
            take(bytes, offset, 8)?;
            offset += 8;

            Record::EndOfFile
        }
        TYPE_STRING => {
            let (key, consumed) = read_string(bytes, offset)?;
            offset += consumed;
            let (value, consumed) = read_string(bytes, offset)?;
            offset += consumed;

            Record::KeyValue {
                key,
                value,
                expires_at: None,
            }
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported RDB opcode or value type 0x{:02X}", other),
            ));
        }
    };

    Ok((record, offset - cursor))
}

/// Reads a value-type byte followed by a key/value pair. Only type 0x00
/// (string) is supported.
fn read_typed_value(bytes: &[u8], cursor: usize) -> io::Result<(String, String, usize)> {
    let value_type = take(bytes, cursor, 1)?[0];

    if value_type != TYPE_STRING {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("unsupported RDB value type 0x{:02X}", value_type),
        ));
    }

    let mut offset = cursor + 1;
    let (key, consumed) = read_string(bytes, offset)?;
    offset += consumed;
    let (value, consumed) = read_string(bytes, offset)?;
    offset += consumed;

    Ok((key, value, offset - cursor))
}

#[cfg(test)]
mod tests {
    use super::{Record, read_record};

    #[test]
    fn test_read_aux_record() {
        let mut bytes = vec![0xFA];
        bytes.extend_from_slice(b"\x09redis-ver\x055.0.7");

        let (record, consumed) = read_record(&bytes, 0).unwrap();
        assert_eq!(
            record,
            Record::Aux {
                key: "redis-ver".to_string(),
                value: "5.0.7".to_string(),
            }
        );
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_read_select_and_resize_records() {
        let bytes = vec![0xFE, 0x00, 0xFB, 0x03, 0x01];

        let (record, consumed) = read_record(&bytes, 0).unwrap();
        assert_eq!(record, Record::SelectDb { index: 0 });

        let (record, _) = read_record(&bytes, consumed).unwrap();
        assert_eq!(
            record,
            Record::ResizeDb {
                hash_table_size: 3,
                expiry_table_size: 1,
            }
        );
    }

    #[test]
    fn test_read_plain_key_value_record() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(b"\x03foo\x03bar");

        let (record, consumed) = read_record(&bytes, 0).unwrap();
        assert_eq!(
            record,
            Record::KeyValue {
                key: "foo".to_string(),
                value: "bar".to_string(),
                expires_at: None,
            }
        );
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_read_key_value_with_millisecond_expiry() {
        let mut bytes = vec![0xFC];
        bytes.extend_from_slice(&1_713_824_559_637u64.to_le_bytes());
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x01k\x01v");

        let (record, consumed) = read_record(&bytes, 0).unwrap();
        let Record::KeyValue {
            key,
            value,
            expires_at,
        } = record
        else {
            panic!("expected a key/value record");
        };

        assert_eq!(key, "k");
        assert_eq!(value, "v");
        assert_eq!(
            expires_at.unwrap().as_millisecond(),
            1_713_824_559_637i64
        );
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_read_key_value_with_second_expiry() {
        let mut bytes = vec![0xFD];
        bytes.extend_from_slice(&1_714_089_298u32.to_le_bytes());
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x01a\x01b");

        let (record, _) = read_record(&bytes, 0).unwrap();
        let Record::KeyValue { expires_at, .. } = record else {
            panic!("expected a key/value record");
        };

        assert_eq!(expires_at.unwrap().as_second(), 1_714_089_298i64);
    }

    #[test]
    fn test_read_end_of_file_record() {
        let bytes = vec![0xFF, 1, 2, 3, 4, 5, 6, 7, 8];

        let (record, consumed) = read_record(&bytes, 0).unwrap();
        assert_eq!(record, Record::EndOfFile);
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_unsupported_value_types_fail() {
        // List value type (0x01) is not supported by this loader.
        assert!(read_record(&[0x01, 0x01, b'k'], 0).is_err());

        let mut with_expiry = vec![0xFC];
        with_expiry.extend_from_slice(&0u64.to_le_bytes());
        with_expiry.push(0x04);
        assert!(read_record(&with_expiry, 0).is_err());
    }
}
