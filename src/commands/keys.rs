use std::sync::Arc;

use globset::Glob;
use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct KeysArguments {
    pattern: String,
}

impl KeysArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("keys"));
        }

        Ok(Self {
            pattern: arguments[0].clone(),
        })
    }
}

/// KEYS returns every currently-present key matching the glob pattern,
/// unordered.
pub async fn keys(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let matcher = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?
        .compile_matcher();

    let mut store_guard = store.lock().await;

    let matching = store_guard
        .keys()
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .map(RespValue::BulkString)
        .collect();

    Ok(RespValue::Array(matching))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::keys;
    use crate::key_value_store::{DataType, KeyValueStore};
    use crate::resp::RespValue;

    #[tokio::test]
    async fn test_keys() {
        let mut store = KeyValueStore::new();
        for key in ["apple", "apricot", "banana"] {
            store.set(key.to_string(), DataType::String("v".to_string()));
        }
        let store = Arc::new(Mutex::new(store));

        let sorted = |value: RespValue| {
            let RespValue::Array(items) = value else {
                panic!("expected an array");
            };
            let mut names: Vec<String> = items
                .into_iter()
                .map(|item| match item {
                    RespValue::BulkString(s) => s,
                    other => panic!("expected bulk string, got {:?}", other),
                })
                .collect();
            names.sort();
            names
        };

        let all = keys(&store, &["*".to_string()]).await.unwrap();
        assert_eq!(sorted(all), vec!["apple", "apricot", "banana"]);

        let prefixed = keys(&store, &["ap*".to_string()]).await.unwrap();
        assert_eq!(sorted(prefixed), vec!["apple", "apricot"]);

        let none = keys(&store, &["cherry*".to_string()]).await.unwrap();
        assert_eq!(sorted(none), Vec::<String>::new());
    }
}
