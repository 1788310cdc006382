use thiserror::Error;

use crate::key_value_store::StoreError;
use crate::resp::RespValue;
use crate::stream::StreamError;

/// Errors raised while parsing or executing a command.
///
/// The `#[error]` text is the exact wire message; `as_string` wraps it in a
/// RESP error frame. Stream and store errors carry their own verbatim
/// messages through transparently.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
    #[error("ERR invalid command frame")]
    InvalidCommandFrame,
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(&'static str),
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR syntax error")]
    SyntaxError,
    #[error("ERR {0}")]
    StreamId(#[from] StreamError),
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,
    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("ERR unknown INFO section '{0}'")]
    UnknownInfoSection(String),
    #[error("ERR unknown CONFIG subcommand '{0}'")]
    UnknownConfigSubcommand(String),
    #[error("ERR unknown CONFIG parameter '{0}'")]
    UnknownConfigParameter(String),
    #[error("ERR invalid glob pattern: {0}")]
    InvalidGlobPattern(String),
    #[error("ERR timeout is not an integer or out of range")]
    InvalidTimeout,
    #[error("ERR WAIT is only available on a master instance")]
    WaitOnReplica,
    #[error("ERR PSYNC is only valid during a replication handshake")]
    PsyncOutsideHandshake,
    #[error("ERR The $ ID is only valid with the BLOCK option")]
    DollarIdWithoutBlock,
}

impl From<StoreError> for CommandError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::WrongType => CommandError::WrongType,
        }
    }
}

impl CommandError {
    /// The RESP error frame for this error, ready to write to a client.
    pub fn as_string(&self) -> String {
        self.as_resp().encode()
    }

    pub fn as_resp(&self) -> RespValue {
        RespValue::Error(self.to_string())
    }
}
