use crate::commands::command_error::CommandError;
use crate::commands::command_handler::CommandHandler;
use crate::resp::RespValue;

/// REPLCONF carries a key/value bag. The recognized keys are
/// `listening-port`, `capa`, `GETACK` and `ACK`.
pub struct ReplconfArguments;

impl ReplconfArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.is_empty() || arguments.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("replconf"));
        }

        for chunk in arguments.chunks(2) {
            let recognized = ["listening-port", "capa", "getack", "ack"]
                .iter()
                .any(|key| chunk[0].eq_ignore_ascii_case(key));

            if !recognized {
                return Err(CommandError::SyntaxError);
            }
        }

        Ok(Self)
    }
}

/// Handles REPLCONF outside of the handshake interception points.
///
/// GETACK never reaches this handler: the offset counter answers it before
/// dispatch. An incoming ACK is consumed by the replica reader loop on the
/// master, so anything that lands here is handshake chatter answered +OK,
/// except ACK itself which gets no reply.
pub fn replconf(command: &CommandHandler) -> Result<Option<RespValue>, CommandError> {
    ReplconfArguments::parse(&command.arguments)?;

    if command.replconf_value("ACK").is_some() {
        return Ok(None);
    }

    Ok(Some(RespValue::SimpleString("OK".to_string())))
}
