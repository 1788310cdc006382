//! MULTI/EXEC/DISCARD transactions.

mod transaction_handler;

pub use transaction_handler::{
    ConnectionTransaction, GlobalTransactionLock, execute_transactional_command,
};
