//! RESP (Redis Serialization Protocol) values, encoding and framed reading.
//!
//! The reader returns, for every parsed value, the exact raw bytes consumed
//! from the stream. Replication forwards those bytes verbatim to replicas, so
//! a frame must never be re-serialized on the propagation path.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncReadExt};

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("unknown RESP type byte '{0}'")]
    UnknownTypeByte(char),
    #[error("invalid length in frame header")]
    InvalidLength,
    #[error("invalid integer in frame")]
    InvalidInteger,
    #[error("frame payload shorter than declared length")]
    ShortRead,
    #[error("invalid UTF-8 sequence in frame")]
    InvalidUtf8,
    #[error("frame line missing CRLF terminator")]
    MissingCrlf,
}

impl RespError {
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR {}", self)).encode()
    }
}

/// A parsed RESP value.
///
/// `Null` is the bulk-string sentinel `$-1\r\n`; it is only ever produced by
/// handlers, never parsed off the wire.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    Array(Vec<RespValue>),
    Null,
}

impl RespValue {
    /// Serializes the value into its canonical RESP byte form.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(s) => format!("-{}\r\n", s),
            RespValue::Integer(i) => format!(":{}\r\n", i),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::Array(items) => {
                let mut encoded = format!("*{}\r\n", items.len());
                for item in items {
                    encoded.push_str(&item.encode());
                }
                encoded
            }
            RespValue::Null => "$-1\r\n".to_string(),
        }
    }
}

/// Incremental RESP frame reader over a buffered byte stream.
///
/// Every successful `read_value` call returns the parsed value together with
/// the raw bytes that made it up, byte-identical to what the peer sent.
pub struct RespReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> RespReader<R> {
    pub fn new(reader: R) -> Self {
        RespReader { reader }
    }

    pub async fn read_value(&mut self) -> Result<(RespValue, Bytes), RespError> {
        let mut raw = BytesMut::new();
        let value = self.read_value_into(&mut raw).await?;
        Ok((value, raw.freeze()))
    }

    async fn read_value_into(&mut self, raw: &mut BytesMut) -> Result<RespValue, RespError> {
        let header = self.read_line(raw).await?;

        let Some(type_byte) = header.bytes().next() else {
            return Err(RespError::UnknownTypeByte('\0'));
        };
        let payload = &header[1..];

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(payload.to_string())),
            b'-' => Ok(RespValue::Error(payload.to_string())),
            b':' => {
                let int = payload
                    .parse::<i64>()
                    .map_err(|_| RespError::InvalidInteger)?;
                Ok(RespValue::Integer(int))
            }
            b'$' => {
                let length = parse_length(payload)?;
                let content = self.read_exact_line(raw, length).await?;
                Ok(RespValue::BulkString(content))
            }
            b'*' => {
                let length = parse_length(payload)?;
                let mut items = Vec::with_capacity(length);

                for _ in 0..length {
                    let item = Box::pin(self.read_value_into(raw)).await?;
                    items.push(item);
                }

                Ok(RespValue::Array(items))
            }
            other => Err(RespError::UnknownTypeByte(other as char)),
        }
    }

    /// Consumes an RDB image framed as `$<N>\r\n` followed by exactly N raw
    /// bytes with no trailing CRLF, discarding the payload. Used once per
    /// replica right after the FULLRESYNC response.
    pub async fn read_rdb(&mut self) -> Result<usize, RespError> {
        let mut raw = BytesMut::new();
        let header = self.read_line(&mut raw).await?;

        if !header.starts_with('$') {
            return Err(RespError::UnknownTypeByte(
                header.chars().next().unwrap_or('\0'),
            ));
        }

        let length = parse_length(&header[1..])?;
        let mut payload = vec![0u8; length];
        self.reader
            .read_exact(&mut payload)
            .await
            .map_err(map_read_error)?;

        Ok(length)
    }

    /// Reads one CRLF-terminated line, appends its bytes (terminator
    /// included) to `raw` and returns the line without the terminator.
    async fn read_line(&mut self, raw: &mut BytesMut) -> Result<String, RespError> {
        let mut line: Vec<u8> = Vec::new();

        loop {
            let mut byte = [0u8; 1];
            let read = self
                .reader
                .read(&mut byte)
                .await
                .map_err(|e| RespError::Io(e.to_string()))?;

            if read == 0 {
                if line.is_empty() && raw.is_empty() {
                    return Err(RespError::ConnectionClosed);
                }
                return Err(RespError::ShortRead);
            }

            line.push(byte[0]);

            if line.ends_with(b"\r\n") {
                break;
            }
        }

        raw.extend_from_slice(&line);
        line.truncate(line.len() - 2);

        String::from_utf8(line).map_err(|_| RespError::InvalidUtf8)
    }

    /// Reads a bulk-string payload of `length` bytes plus its CRLF
    /// terminator, appending everything to `raw`.
    async fn read_exact_line(
        &mut self,
        raw: &mut BytesMut,
        length: usize,
    ) -> Result<String, RespError> {
        let mut payload = vec![0u8; length + 2];
        self.reader
            .read_exact(&mut payload)
            .await
            .map_err(map_read_error)?;

        if &payload[length..] != b"\r\n" {
            return Err(RespError::MissingCrlf);
        }

        raw.extend_from_slice(&payload);
        payload.truncate(length);

        String::from_utf8(payload).map_err(|_| RespError::InvalidUtf8)
    }
}

fn parse_length(payload: &str) -> Result<usize, RespError> {
    payload.parse::<usize>().map_err(|_| RespError::InvalidLength)
}

fn map_read_error(e: std::io::Error) -> RespError {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof => RespError::ShortRead,
        _ => RespError::Io(e.to_string()),
    }
}
