use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct TypeArguments {
    key: String,
}

impl TypeArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("type"));
        }

        Ok(Self {
            key: arguments[0].clone(),
        })
    }
}

pub async fn type_command(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let type_arguments = TypeArguments::parse(arguments)?;

    let mut store_guard = store.lock().await;
    let type_name = store_guard.get_type(&type_arguments.key);

    Ok(RespValue::SimpleString(type_name.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::type_command;
    use crate::key_value_store::{DataType, KeyValueStore};

    #[tokio::test]
    async fn test_type_command() {
        let mut store = KeyValueStore::new();
        store.set("s".to_string(), DataType::String("v".to_string()));
        store.set("n".to_string(), DataType::Int(1));
        store.set(
            "events".to_string(),
            DataType::Stream(Arc::new(crate::stream::Stream::new())),
        );
        let store = Arc::new(Mutex::new(store));

        let test_cases = vec![
            ("s", "+string\r\n"),
            ("n", "+int\r\n"),
            ("events", "+stream\r\n"),
            ("missing", "+none\r\n"),
        ];

        for (key, expected) in test_cases {
            let result = type_command(&store, &[key.to_string()]).await.unwrap();
            assert_eq!(result.encode(), expected, "type of {}", key);
        }
    }
}
