use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::commands::xrange::entries_to_resp;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;
use crate::stream::{Stream, StreamId};

/// The id a client read from: a concrete position, or `$` for "only entries
/// appended after this call" (valid only together with BLOCK).
#[derive(Debug, Clone, Copy, PartialEq)]
enum ReadFrom {
    After(StreamId),
    OnlyNew,
}

pub struct XreadArguments {
    block_ms: Option<u64>,
    queries: Vec<(String, ReadFrom)>,
}

impl XreadArguments {
    /// XREAD [BLOCK ms] STREAMS key [key ...] id [id ...]
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::WrongNumberOfArguments("xread"));
        }

        let (block_ms, streams_index) = if arguments[0].eq_ignore_ascii_case("block") {
            let ms = arguments[1]
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidTimeout)?;
            (Some(ms), 2)
        } else {
            (None, 0)
        };

        if !arguments
            .get(streams_index)
            .is_some_and(|arg| arg.eq_ignore_ascii_case("streams"))
        {
            return Err(CommandError::SyntaxError);
        }

        let tail = &arguments[streams_index + 1..];
        if tail.is_empty() || tail.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("xread"));
        }

        let half = tail.len() / 2;
        let mut queries = Vec::with_capacity(half);

        for i in 0..half {
            let key = tail[i].clone();
            let read_from = match tail[half + i].as_str() {
                "$" => {
                    if block_ms.is_none() {
                        return Err(CommandError::DollarIdWithoutBlock);
                    }
                    ReadFrom::OnlyNew
                }
                id => ReadFrom::After(StreamId::parse(id)?),
            };

            queries.push((key, read_from));
        }

        Ok(Self { block_ms, queries })
    }
}

/// XREAD returns, per stream, the entries strictly after the supplied id.
///
/// With BLOCK, only the first stream is honoured: the reply contains the
/// already-present entries after the id plus the first entry appended while
/// waiting, or the bulk Null when the wait times out.
pub async fn xread(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    match xread_arguments.block_ms {
        None => read_streams(store, &xread_arguments.queries).await,
        Some(timeout_ms) => {
            let (key, read_from) = xread_arguments.queries[0].clone();
            read_blocking(store, &key, read_from, timeout_ms).await
        }
    }
}

async fn read_streams(
    store: &Arc<Mutex<KeyValueStore>>,
    queries: &[(String, ReadFrom)],
) -> Result<RespValue, CommandError> {
    let mut results = Vec::with_capacity(queries.len());

    for (key, read_from) in queries {
        let Some(stream) = lookup_stream(store, key).await? else {
            results.push(RespValue::Array(vec![
                RespValue::BulkString(key.clone()),
                RespValue::Null,
            ]));
            continue;
        };

        let ReadFrom::After(start) = read_from else {
            // `$` is rejected at parse time without BLOCK.
            continue;
        };

        let entries = stream.get_range_exclusive(Some(*start), None).await;
        results.push(RespValue::Array(vec![
            RespValue::BulkString(key.clone()),
            entries_to_resp(&entries),
        ]));
    }

    Ok(RespValue::Array(results))
}

async fn read_blocking(
    store: &Arc<Mutex<KeyValueStore>>,
    key: &str,
    read_from: ReadFrom,
    timeout_ms: u64,
) -> Result<RespValue, CommandError> {
    let Some(stream) = lookup_stream(store, key).await? else {
        return Ok(RespValue::Array(vec![
            RespValue::BulkString(key.to_string()),
            RespValue::Null,
        ]));
    };

    let mut entries = match read_from {
        ReadFrom::OnlyNew => Vec::new(),
        ReadFrom::After(start) => stream.get_range_exclusive(Some(start), None).await,
    };

    let Some(new_entry) = stream.block_until_new(timeout_ms).await else {
        return Ok(RespValue::Null);
    };
    entries.push(new_entry);

    Ok(RespValue::Array(vec![RespValue::Array(vec![
        RespValue::BulkString(key.to_string()),
        entries_to_resp(&entries),
    ])]))
}

async fn lookup_stream(
    store: &Arc<Mutex<KeyValueStore>>,
    key: &str,
) -> Result<Option<Arc<Stream>>, CommandError> {
    let mut store_guard = store.lock().await;

    match store_guard.get_entry(key) {
        Some(DataType::Stream(stream)) => Ok(Some(stream)),
        Some(_) => Err(CommandError::WrongType),
        None => Ok(None),
    }
}
