//! Replica-side replication handshake.

use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::info;

use crate::resp::{RespError, RespReader, RespValue};

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to connect to master: {0}")]
    Connect(String),
    #[error("I/O error during handshake: {0}")]
    Io(String),
    #[error("protocol error during handshake")]
    Resp(#[from] RespError),
    #[error("unexpected response from master: {0}")]
    UnexpectedResponse(String),
}

/// The established link to the master after a successful handshake.
///
/// The reader is the same buffered reader the handshake used, so no
/// propagated bytes that may already be in its buffer are lost.
pub struct MasterConnection {
    pub reader: RespReader<BufReader<OwnedReadHalf>>,
    pub writer: OwnedWriteHalf,
}

/// Runs the four-step handshake against the master and discards the RDB
/// image that follows FULLRESYNC:
///
/// 1. `PING`, expect `+PONG`
/// 2. `REPLCONF listening-port <own port>`, expect `+OK`
/// 3. `REPLCONF capa psync2`, expect `+OK`
/// 4. `PSYNC ? -1`, expect `+FULLRESYNC <40-char id> <offset>`
pub async fn perform_handshake(
    master_host: &str,
    master_port: u16,
    own_port: u16,
) -> Result<MasterConnection, HandshakeError> {
    let stream = TcpStream::connect((master_host, master_port))
        .await
        .map_err(|e| HandshakeError::Connect(e.to_string()))?;

    let (read_half, mut writer) = stream.into_split();
    let mut reader = RespReader::new(BufReader::new(read_half));

    let response = exchange(&mut reader, &mut writer, &["PING"]).await?;
    expect_simple(&response, "PONG")?;

    let own_port = own_port.to_string();
    let response = exchange(
        &mut reader,
        &mut writer,
        &["REPLCONF", "listening-port", &own_port],
    )
    .await?;
    expect_simple(&response, "OK")?;

    let response = exchange(&mut reader, &mut writer, &["REPLCONF", "capa", "psync2"]).await?;
    expect_simple(&response, "OK")?;

    let response = exchange(&mut reader, &mut writer, &["PSYNC", "?", "-1"]).await?;
    validate_full_resync(&response)?;

    let rdb_len = reader.read_rdb().await?;
    info!(rdb_len, master_host, master_port, "handshake complete");

    Ok(MasterConnection { reader, writer })
}

async fn exchange(
    reader: &mut RespReader<BufReader<OwnedReadHalf>>,
    writer: &mut OwnedWriteHalf,
    parts: &[&str],
) -> Result<RespValue, HandshakeError> {
    let command = RespValue::Array(
        parts
            .iter()
            .map(|part| RespValue::BulkString(part.to_string()))
            .collect(),
    );

    writer
        .write_all(command.encode().as_bytes())
        .await
        .map_err(|e| HandshakeError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| HandshakeError::Io(e.to_string()))?;

    let (response, _) = reader.read_value().await?;
    Ok(response)
}

fn expect_simple(response: &RespValue, expected: &str) -> Result<(), HandshakeError> {
    match response {
        RespValue::SimpleString(s) if s == expected => Ok(()),
        other => Err(HandshakeError::UnexpectedResponse(format!("{:?}", other))),
    }
}

/// Checks a `FULLRESYNC <replid> <offset>` simple string: the replication id
/// must be 40 alphanumeric characters and the offset an integer.
fn validate_full_resync(response: &RespValue) -> Result<(), HandshakeError> {
    let RespValue::SimpleString(line) = response else {
        return Err(HandshakeError::UnexpectedResponse(format!("{:?}", response)));
    };

    let parts: Vec<&str> = line.split_whitespace().collect();

    let valid = parts.len() == 3
        && parts[0] == "FULLRESYNC"
        && is_valid_repl_id(parts[1])
        && parts[2].parse::<i64>().is_ok();

    if !valid {
        return Err(HandshakeError::UnexpectedResponse(line.clone()));
    }

    Ok(())
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9]{40}$").expect("replication id pattern is valid");
    re.is_match(repl_id)
}
