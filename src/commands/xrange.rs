use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::command_error::CommandError;
use crate::key_value_store::{DataType, KeyValueStore};
use crate::resp::RespValue;
use crate::stream::{StreamEntry, StreamId};

pub struct XrangeArguments {
    key: String,
    start: Option<StreamId>,
    end: Option<StreamId>,
}

impl XrangeArguments {
    /// XRANGE key start end
    ///
    /// `-` and `+` are the open start/end sentinels. A bare `<ms>` expands to
    /// `(ms, 0)` on the start bound and `(ms, u64::MAX)` on the end bound.
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("xrange"));
        }

        let start = match arguments[1].as_str() {
            "-" => None,
            bound => Some(parse_bound(bound, 0)?),
        };

        let end = match arguments[2].as_str() {
            "+" => None,
            bound => Some(parse_bound(bound, u64::MAX)?),
        };

        Ok(Self {
            key: arguments[0].clone(),
            start,
            end,
        })
    }
}

fn parse_bound(input: &str, default_seq: u64) -> Result<StreamId, CommandError> {
    if input.contains('-') {
        return Ok(StreamId::parse(input)?);
    }

    let ms = input
        .parse::<u64>()
        .map_err(|_| CommandError::StreamId(crate::stream::StreamError::InvalidIdFormat))?;

    Ok(StreamId::new(ms, default_seq))
}

pub(crate) fn entries_to_resp(entries: &[StreamEntry]) -> RespValue {
    RespValue::Array(entries.iter().map(StreamEntry::to_resp).collect())
}

/// XRANGE returns the entries with ids inside the inclusive bounds, or the
/// bulk Null when the key does not exist.
pub async fn xrange(
    store: &Arc<Mutex<KeyValueStore>>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let stream = {
        let mut store_guard = store.lock().await;
        match store_guard.get_entry(&xrange_arguments.key) {
            Some(DataType::Stream(stream)) => stream,
            Some(_) => return Err(CommandError::WrongType),
            None => return Ok(RespValue::Null),
        }
    };

    let entries = stream
        .get_range_inclusive(xrange_arguments.start, xrange_arguments.end)
        .await;

    Ok(entries_to_resp(&entries))
}
