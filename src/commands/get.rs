use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct GetArguments {
    key: String,
}

impl GetArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("get"));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// GET returns the stringified value or the bulk Null for a missing (or
/// expired) key. Reading a stream this way is a type error.
pub async fn get(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    match store_guard.get(&get_arguments.key)? {
        Some(value) => Ok(RespValue::BulkString(value)),
        None => Ok(RespValue::Null),
    }
}
