use std::sync::atomic::{AtomicU64, Ordering};

use crate::commands::CommandHandler;
use crate::resp::RespValue;

/// Counts the raw RESP bytes of every command a replica consumes from its
/// master connection.
///
/// A `REPLCONF GETACK` is answered with the byte count accumulated strictly
/// before it: the ACK is built first, then the GETACK's own bytes are added.
#[derive(Debug, Default)]
pub struct OffsetCounter {
    bytes_processed: AtomicU64,
}

impl OffsetCounter {
    pub fn new() -> Self {
        OffsetCounter::default()
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed.load(Ordering::SeqCst)
    }

    /// Observes a command, returning the ACK response when the command is a
    /// GETACK request.
    pub fn observe(&self, command: &CommandHandler) -> Option<RespValue> {
        let response = if command.is_getack() {
            Some(RespValue::Array(vec![
                RespValue::BulkString("REPLCONF".to_string()),
                RespValue::BulkString("ACK".to_string()),
                RespValue::BulkString(self.bytes_processed().to_string()),
            ]))
        } else {
            None
        };

        self.bytes_processed
            .fetch_add(command.raw.len() as u64, Ordering::SeqCst);

        response
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::OffsetCounter;
    use crate::commands::CommandHandler;
    use crate::resp::RespValue;

    fn command(parts: &[&str]) -> CommandHandler {
        let value = RespValue::Array(
            parts
                .iter()
                .map(|p| RespValue::BulkString(p.to_string()))
                .collect(),
        );
        let raw = Bytes::from(value.encode());
        CommandHandler::new(&value, raw).unwrap()
    }

    #[test]
    fn test_ack_reflects_prefix_before_the_getack() {
        let counter = OffsetCounter::new();

        let ping = command(&["PING"]);
        let set = command(&["SET", "foo", "bar"]);
        let getack = command(&["REPLCONF", "GETACK", "*"]);

        assert_eq!(counter.observe(&ping), None);
        assert_eq!(counter.observe(&set), None);

        let expected = (ping.raw.len() + set.raw.len()) as u64;
        let ack = counter.observe(&getack).expect("GETACK must be answered");
        assert_eq!(
            ack,
            RespValue::Array(vec![
                RespValue::BulkString("REPLCONF".to_string()),
                RespValue::BulkString("ACK".to_string()),
                RespValue::BulkString(expected.to_string()),
            ])
        );

        // The GETACK itself counts toward the next ACK.
        assert_eq!(
            counter.bytes_processed(),
            expected + getack.raw.len() as u64
        );
    }

    #[test]
    fn test_first_getack_reports_zero() {
        let counter = OffsetCounter::new();
        let getack = command(&["REPLCONF", "GETACK", "*"]);

        let ack = counter.observe(&getack).unwrap();
        let RespValue::Array(parts) = ack else {
            panic!("expected an array");
        };
        assert_eq!(parts[2], RespValue::BulkString("0".to_string()));
    }
}
