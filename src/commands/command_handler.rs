use bytes::Bytes;

use crate::commands::command_error::CommandError;
use crate::resp::RespValue;

/// Commands that are forwarded to replicas after the master executes them.
const WRITE_COMMANDS: [&str; 1] = ["SET"];

const TRANSACTION_COMMANDS: [&str; 3] = ["MULTI", "EXEC", "DISCARD"];

/// A parsed wire command: uppercased name, its arguments, and the exact raw
/// bytes the client sent (replication forwards those verbatim).
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
    pub raw: Bytes,
}

impl CommandHandler {
    /// Builds a command from a RESP array of bulk strings.
    ///
    /// The first element is the command name; the rest are its arguments.
    /// Anything else on the wire is a protocol-level error.
    pub fn new(input: &RespValue, raw: Bytes) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = input else {
            return Err(CommandError::InvalidCommandFrame);
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(s)) => s.to_uppercase(),
            _ => return Err(CommandError::InvalidCommandFrame),
        };

        let mut arguments = Vec::with_capacity(elements.len().saturating_sub(1));
        for element in elements[1..].iter() {
            match element {
                RespValue::BulkString(s) => arguments.push(s.clone()),
                _ => return Err(CommandError::InvalidCommandFrame),
            }
        }

        Ok(Self {
            name,
            arguments,
            raw,
        })
    }

    pub fn is_write_command(&self) -> bool {
        WRITE_COMMANDS.contains(&self.name.as_str())
    }

    pub fn is_transaction_command(&self) -> bool {
        TRANSACTION_COMMANDS.contains(&self.name.as_str())
    }

    /// True for the `REPLCONF listening-port <p>` command that turns a client
    /// connection into a replica.
    pub fn is_replica_attachment(&self) -> bool {
        self.name == "REPLCONF" && self.replconf_value("listening-port").is_some()
    }

    pub fn is_getack(&self) -> bool {
        self.name == "REPLCONF" && self.replconf_value("GETACK").is_some()
    }

    /// Looks up a value in a REPLCONF-style key/value argument bag,
    /// case-insensitively.
    pub fn replconf_value(&self, key: &str) -> Option<&str> {
        self.arguments
            .chunks(2)
            .find(|chunk| chunk.len() == 2 && chunk[0].eq_ignore_ascii_case(key))
            .map(|chunk| chunk[1].as_str())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::CommandHandler;
    use crate::commands::command_error::CommandError;
    use crate::resp::RespValue;

    fn command(parts: &[&str]) -> CommandHandler {
        let value = RespValue::Array(
            parts
                .iter()
                .map(|p| RespValue::BulkString(p.to_string()))
                .collect(),
        );
        CommandHandler::new(&value, Bytes::from(value.encode())).unwrap()
    }

    #[test]
    fn test_new_uppercases_name_and_keeps_arguments() {
        let cmd = command(&["set", "foo", "bar"]);

        assert_eq!(cmd.name, "SET");
        assert_eq!(cmd.arguments, vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(
            cmd.raw,
            Bytes::from("*3\r\n$3\r\nset\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
        );
    }

    #[test]
    fn test_new_rejects_non_command_frames() {
        let test_cases = vec![
            RespValue::SimpleString("PING".to_string()),
            RespValue::Integer(42),
            RespValue::Array(vec![RespValue::Integer(1)]),
            RespValue::Array(vec![
                RespValue::BulkString("SET".to_string()),
                RespValue::Integer(1),
            ]),
        ];

        for input in test_cases {
            let result = CommandHandler::new(&input, Bytes::new());
            assert_eq!(
                result,
                Err(CommandError::InvalidCommandFrame),
                "parsing {:?}",
                input
            );
        }
    }

    #[test]
    fn test_command_classification() {
        assert!(command(&["SET", "k", "v"]).is_write_command());
        assert!(!command(&["GET", "k"]).is_write_command());
        assert!(command(&["MULTI"]).is_transaction_command());
        assert!(command(&["EXEC"]).is_transaction_command());
        assert!(!command(&["SET", "k", "v"]).is_transaction_command());
    }

    #[test]
    fn test_replconf_bag_lookup() {
        let cmd = command(&["REPLCONF", "listening-port", "6380"]);
        assert!(cmd.is_replica_attachment());
        assert_eq!(cmd.replconf_value("listening-port"), Some("6380"));
        assert_eq!(cmd.replconf_value("LISTENING-PORT"), Some("6380"));

        let cmd = command(&["REPLCONF", "GETACK", "*"]);
        assert!(cmd.is_getack());
        assert!(!cmd.is_replica_attachment());

        let cmd = command(&["REPLCONF", "capa", "psync2"]);
        assert!(!cmd.is_getack());
        assert!(!cmd.is_replica_attachment());
    }
}
