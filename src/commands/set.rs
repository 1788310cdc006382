use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct SetArguments {
    key: String,
    value: String,
    px_ms: Option<u64>,
}

impl SetArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::WrongNumberOfArguments("set"));
        }

        let mut px_ms = None;

        if arguments.len() == 4 {
            if !arguments[2].eq_ignore_ascii_case("px") {
                return Err(CommandError::SyntaxError);
            }

            let ms = arguments[3]
                .parse::<u64>()
                .map_err(|_| CommandError::NotAnInteger)?;
            px_ms = Some(ms);
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            px_ms,
        })
    }
}

/// SET stores the value, replacing any previous one and its expiry. A value
/// that parses as a base-10 integer is stored under the Int tag so that TYPE
/// reports `int` and INCR can operate on it directly.
pub async fn set(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let value = match set_arguments.value.parse::<i64>() {
        Ok(int) => DataType::Int(int),
        Err(_) => DataType::String(set_arguments.value),
    };

    let mut store_guard = store.lock().await;

    match set_arguments.px_ms {
        Some(ms) => store_guard.set_px(set_arguments.key, value, ms),
        None => store_guard.set(set_arguments.key, value),
    }

    Ok(RespValue::SimpleString("OK".to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::set;
    use crate::commands::command_error::CommandError;
    use crate::key_value_store::KeyValueStore;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_stores_strings_and_integers() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let result = set(&store, &args(&["fruit", "mango"])).await.unwrap();
        assert_eq!(result.encode(), "+OK\r\n");

        let result = set(&store, &args(&["count", "41"])).await.unwrap();
        assert_eq!(result.encode(), "+OK\r\n");

        let mut store_guard = store.lock().await;
        assert_eq!(store_guard.get_type("fruit"), "string");
        assert_eq!(store_guard.get_type("count"), "int");
        assert_eq!(store_guard.get("count"), Ok(Some("41".to_string())));
    }

    #[tokio::test]
    async fn test_set_with_px_expires() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        set(&store, &args(&["temp", "v", "PX", "40"])).await.unwrap();
        assert_eq!(
            store.lock().await.get("temp"),
            Ok(Some("v".to_string()))
        );

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.lock().await.get("temp"), Ok(None));
    }

    #[tokio::test]
    async fn test_set_argument_errors() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let test_cases = vec![
            (args(&["k"]), CommandError::WrongNumberOfArguments("set")),
            (
                args(&["k", "v", "EX", "10"]),
                CommandError::SyntaxError,
            ),
            (
                args(&["k", "v", "PX", "soon"]),
                CommandError::NotAnInteger,
            ),
        ];

        for (arguments, expected) in test_cases {
            let result = set(&store, &arguments).await;
            assert_eq!(result, Err(expected), "setting {:?}", arguments);
        }
    }
}
