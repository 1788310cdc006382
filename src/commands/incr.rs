use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct IncrArguments {
    key: String,
}

impl IncrArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("incr"));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

/// INCR increments the integer stored at `key` by one, creating the key with
/// value 1 when it is missing. Only Int-tagged values are incrementable.
pub async fn incr(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let incr_arguments = IncrArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;

    let next = match store_guard.get_entry(&incr_arguments.key) {
        None => 1,
        Some(DataType::Int(current)) => current
            .checked_add(1)
            .ok_or(CommandError::NotAnInteger)?,
        Some(_) => return Err(CommandError::NotAnInteger),
    };

    store_guard.set(incr_arguments.key, DataType::Int(next));

    Ok(RespValue::Integer(next))
}
