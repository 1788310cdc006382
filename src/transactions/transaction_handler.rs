use tokio::sync::Mutex;

use crate::commands::{CommandError, CommandExecutor, CommandHandler};
use crate::resp::RespValue;

/// Per-connection transaction state: idle, or queuing commands since MULTI.
#[derive(Debug, Default)]
pub struct ConnectionTransaction {
    queue: Vec<CommandHandler>,
    active: bool,
}

impl ConnectionTransaction {
    pub fn new() -> Self {
        ConnectionTransaction::default()
    }

    /// True when the command must be routed through the transaction machine:
    /// every command while queuing, and MULTI/EXEC/DISCARD always.
    pub fn should_consume(&self, command: &CommandHandler) -> bool {
        self.active || command.is_transaction_command()
    }
}

/// The server-wide EXEC lock.
///
/// Held for the whole execution of a queued batch, so concurrent EXECs are
/// serialized against each other and transactional batches appear atomic to
/// other connections. It is deliberately separate from the keyspace lock:
/// EXEC atomicity is about command-sequence serialization.
#[derive(Debug, Default)]
pub struct GlobalTransactionLock {
    lock: Mutex<()>,
}

impl GlobalTransactionLock {
    pub fn new() -> Self {
        GlobalTransactionLock::default()
    }
}

/// Runs one command through the per-connection transaction state machine.
///
/// MULTI opens a queue (nested MULTI is rejected), DISCARD drops it, EXEC
/// executes it under the global lock and replies with the array of
/// responses. Any other command is queued with `+QUEUED`; queueing is
/// best-effort, so a bad command is only reported when EXEC runs it and its
/// error lands in the response array.
pub async fn execute_transactional_command(
    command: &CommandHandler,
    transaction: &mut ConnectionTransaction,
    global_lock: &GlobalTransactionLock,
    executor: &CommandExecutor,
) -> RespValue {
    match command.name.as_str() {
        "MULTI" => {
            if transaction.active {
                return CommandError::NestedMulti.as_resp();
            }

            transaction.active = true;
            RespValue::SimpleString("OK".to_string())
        }
        "DISCARD" => {
            if !transaction.active {
                return CommandError::DiscardWithoutMulti.as_resp();
            }

            transaction.active = false;
            transaction.queue.clear();
            RespValue::SimpleString("OK".to_string())
        }
        "EXEC" => {
            if !transaction.active {
                return CommandError::ExecWithoutMulti.as_resp();
            }

            transaction.active = false;
            let queued = std::mem::take(&mut transaction.queue);

            let _guard = global_lock.lock.lock().await;

            let mut responses = Vec::with_capacity(queued.len());
            for queued_command in &queued {
                let response = executor
                    .execute(queued_command, true)
                    .await
                    .unwrap_or(RespValue::Null);
                responses.push(response);
            }

            RespValue::Array(responses)
        }
        _ => {
            transaction.queue.push(command.clone());
            RespValue::SimpleString("QUEUED".to_string())
        }
    }
}
