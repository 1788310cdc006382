use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;
use crate::stream::{RequestedId, Stream};

pub struct XaddArguments {
    key: String,
    id: RequestedId,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    /// XADD key id field value [field value ...]
    ///
    /// The id grammar is `*` | `<ms>-*` | `<ms>-<seq>`.
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xadd"));
        }

        let id = RequestedId::parse(&arguments[1])?;

        let fields = arguments[2..]
            .chunks(2)
            .map(|chunk| (chunk[0].clone(), chunk[1].clone()))
            .collect();

        Ok(Self {
            key: arguments[0].clone(),
            id,
            fields,
        })
    }
}

/// XADD appends an entry to the stream at `key`, creating the stream on
/// first use, and replies with the id that was actually assigned.
pub async fn xadd(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let stream = resolve_stream(store, &xadd_arguments.key).await?;
    let id = stream.append(xadd_arguments.id, xadd_arguments.fields).await?;

    Ok(RespValue::BulkString(id.to_string()))
}

/// Fetches the stream stored at `key`, creating and storing a fresh one when
/// the key is absent. Any other value type is a type error.
pub(crate) async fn resolve_stream(
    store: &Arc<Mutex<KeyValueStore>>,
    key: &str,
) -> Result<Arc<Stream>, CommandError> {
    let mut store_guard = store.lock().await;

    match store_guard.get_entry(key) {
        Some(DataType::Stream(stream)) => Ok(stream),
        Some(_) => Err(CommandError::WrongType),
        None => {
            let stream = Arc::new(Stream::new());
            store_guard.set(key.to_string(), DataType::Stream(Arc::clone(&stream)));
            Ok(stream)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::xadd;
    use crate::commands::command_error::CommandError;
    use crate::key_value_store::{DataType, KeyValueStore};
    use crate::stream::StreamError;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_xadd_creates_stream_and_enforces_ordering() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let test_cases = vec![
            (args(&["s", "1-1", "a", "1"]), Ok("$3\r\n1-1\r\n".to_string())),
            (args(&["s", "1-2", "a", "2"]), Ok("$3\r\n1-2\r\n".to_string())),
            (
                args(&["s", "1-2", "a", "3"]),
                Err(CommandError::StreamId(StreamError::IdNotGreaterThanLast)),
            ),
            (
                args(&["s", "0-0", "a", "4"]),
                Err(CommandError::StreamId(StreamError::IdBelowMinimum)),
            ),
            (args(&["s", "1-*", "a", "5"]), Ok("$3\r\n1-3\r\n".to_string())),
            (args(&["s", "2-*", "a", "6"]), Ok("$3\r\n2-0\r\n".to_string())),
            (
                args(&["s", "oops", "a", "7"]),
                Err(CommandError::StreamId(StreamError::InvalidIdFormat)),
            ),
            (
                args(&["s", "1-1", "orphan"]),
                Err(CommandError::WrongNumberOfArguments("xadd")),
            ),
        ];

        for (arguments, expected) in test_cases {
            let result = xadd(&store, &arguments).await.map(|v| v.encode());
            assert_eq!(result, expected, "xadd {:?}", arguments);
        }

        assert_eq!(store.lock().await.get_type("s"), "stream");
    }

    #[tokio::test]
    async fn test_xadd_on_non_stream_key_is_a_type_error() {
        let mut store = KeyValueStore::new();
        store.set("k".to_string(), DataType::String("v".to_string()));
        let store = Arc::new(Mutex::new(store));

        let result = xadd(&store, &args(&["k", "1-1", "a", "1"])).await;
        assert_eq!(result, Err(CommandError::WrongType));
    }

    #[tokio::test]
    async fn test_xadd_full_auto_id() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let first = xadd(&store, &args(&["s", "*", "a", "1"])).await.unwrap();
        let second = xadd(&store, &args(&["s", "*", "a", "2"])).await.unwrap();

        assert_ne!(first, second);
    }
}
