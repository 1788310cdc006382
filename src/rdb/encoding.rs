//! RDB length and string encodings.
//!
//! The first byte's top two bits select the encoding: `00` is a 6-bit
//! length, `01` a 14-bit length spanning one extra byte, `10` a length in
//! the following 4 (or 8) bytes, and `11` a special encoding whose 6-bit
//! subtype selects an integer-as-string width or LZF compression (which
//! this loader does not support).

use tokio::io;

#[derive(Debug, PartialEq)]
pub(crate) enum ValueEncoding {
    Length(usize),
    Int8,
    Int16,
    Int32,
    LzfCompressed,
}

pub(crate) fn take(bytes: &[u8], cursor: usize, len: usize) -> io::Result<&[u8]> {
    if cursor + len > bytes.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "not enough data in RDB buffer",
        ));
    }

    Ok(&bytes[cursor..cursor + len])
}

/// Reads one length-encoding header. Returns the encoding and the number of
/// bytes consumed.
pub(crate) fn read_encoding(bytes: &[u8], cursor: usize) -> io::Result<(ValueEncoding, usize)> {
    let first = take(bytes, cursor, 1)?[0];

    match first >> 6 {
        0b00 => Ok((ValueEncoding::Length((first & 0b0011_1111) as usize), 1)),
        0b01 => {
            let second = take(bytes, cursor + 1, 1)?[0];
            let length = (((first & 0b0011_1111) as usize) << 8) | second as usize;

            Ok((ValueEncoding::Length(length), 2))
        }
        0b10 => match first {
            0x80 => {
                let raw: [u8; 4] = take(bytes, cursor + 1, 4)?.try_into().unwrap_or_default();
                Ok((ValueEncoding::Length(u32::from_be_bytes(raw) as usize), 5))
            }
            0x81 => {
                let raw: [u8; 8] = take(bytes, cursor + 1, 8)?.try_into().unwrap_or_default();
                Ok((ValueEncoding::Length(u64::from_be_bytes(raw) as usize), 9))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid RDB length encoding",
            )),
        },
        _ => match first & 0b0011_1111 {
            0 => Ok((ValueEncoding::Int8, 1)),
            1 => Ok((ValueEncoding::Int16, 1)),
            2 => Ok((ValueEncoding::Int32, 1)),
            3 => Ok((ValueEncoding::LzfCompressed, 1)),
            subtype => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid RDB special encoding subtype {}", subtype),
            )),
        },
    }
}

/// Reads a plain length; special encodings are not valid here.
pub(crate) fn read_length(bytes: &[u8], cursor: usize) -> io::Result<(usize, usize)> {
    match read_encoding(bytes, cursor)? {
        (ValueEncoding::Length(length), consumed) => Ok((length, consumed)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "expected a length-encoded integer",
        )),
    }
}

/// Reads a string value: either a length-prefixed byte run or an integer
/// stored in its binary little-endian form and rendered in base 10.
pub(crate) fn read_string(bytes: &[u8], cursor: usize) -> io::Result<(String, usize)> {
    let (encoding, header_len) = read_encoding(bytes, cursor)?;
    let cursor = cursor + header_len;

    match encoding {
        ValueEncoding::Length(length) => {
            let raw = take(bytes, cursor, length)?;
            let value = String::from_utf8(raw.to_vec()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8 in RDB string")
            })?;

            Ok((value, header_len + length))
        }
        ValueEncoding::Int8 => {
            let raw: [u8; 1] = take(bytes, cursor, 1)?.try_into().unwrap_or_default();
            Ok((i8::from_le_bytes(raw).to_string(), header_len + 1))
        }
        ValueEncoding::Int16 => {
            let raw: [u8; 2] = take(bytes, cursor, 2)?.try_into().unwrap_or_default();
            Ok((i16::from_le_bytes(raw).to_string(), header_len + 2))
        }
        ValueEncoding::Int32 => {
            let raw: [u8; 4] = take(bytes, cursor, 4)?.try_into().unwrap_or_default();
            Ok((i32::from_le_bytes(raw).to_string(), header_len + 4))
        }
        ValueEncoding::LzfCompressed => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "LZF-compressed RDB strings are not supported",
        )),
    }
}
