//! Append-only streams with monotonic IDs and blocking consumers.
//!
//! A stream is an ordered sequence of entries plus a set of pending waiters.
//! Waiters are single-delivery slots: an append delivers the new entry to
//! every registered waiter exactly once and clears the set. ID generation and
//! the append happen under one lock acquisition, so the monotonicity
//! invariant cannot race with concurrent producers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, oneshot};

#[derive(Error, Debug, PartialEq)]
pub enum StreamError {
    #[error("The ID specified in XADD must be greater than 0-0")]
    IdBelowMinimum,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    IdNotGreaterThanLast,
    #[error("Invalid stream ID specified as stream command argument")]
    InvalidIdFormat,
}

/// A stream entry id: milliseconds plus a sequence number, ordered
/// lexicographically. The minimum admissible id is `0-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    /// Parses a strict `<ms>-<seq>` id. `*` forms are handled by
    /// [`RequestedId::parse`].
    pub fn parse(input: &str) -> Result<Self, StreamError> {
        let (ms, seq) = input.split_once('-').ok_or(StreamError::InvalidIdFormat)?;

        let ms = ms.parse::<u64>().map_err(|_| StreamError::InvalidIdFormat)?;
        let seq = seq.parse::<u64>().map_err(|_| StreamError::InvalidIdFormat)?;

        Ok(StreamId { ms, seq })
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// The id form a client passed to XADD.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RequestedId {
    /// `<ms>-<seq>`
    Explicit(StreamId),
    /// `<ms>-*`
    PartialAuto { ms: u64 },
    /// `*`
    FullAuto,
}

impl RequestedId {
    pub fn parse(input: &str) -> Result<Self, StreamError> {
        if input == "*" {
            return Ok(RequestedId::FullAuto);
        }

        let (ms, seq) = input.split_once('-').ok_or(StreamError::InvalidIdFormat)?;
        let ms = ms.parse::<u64>().map_err(|_| StreamError::InvalidIdFormat)?;

        if seq == "*" {
            return Ok(RequestedId::PartialAuto { ms });
        }

        let seq = seq.parse::<u64>().map_err(|_| StreamError::InvalidIdFormat)?;
        Ok(RequestedId::Explicit(StreamId { ms, seq }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    /// Field-value pairs in the order the client sent them.
    pub fields: Vec<(String, String)>,
}

impl StreamEntry {
    /// The wire shape of an entry: `[id, [field, value, ...]]`.
    pub fn to_resp(&self) -> crate::resp::RespValue {
        use crate::resp::RespValue;

        let mut flat = Vec::with_capacity(self.fields.len() * 2);
        for (field, value) in &self.fields {
            flat.push(RespValue::BulkString(field.clone()));
            flat.push(RespValue::BulkString(value.clone()));
        }

        RespValue::Array(vec![
            RespValue::BulkString(self.id.to_string()),
            RespValue::Array(flat),
        ])
    }
}

#[derive(Debug)]
struct Waiter {
    token: u64,
    slot: oneshot::Sender<StreamEntry>,
}

#[derive(Debug, Default)]
struct StreamInner {
    entries: Vec<StreamEntry>,
    waiters: Vec<Waiter>,
}

#[derive(Debug, Default)]
pub struct Stream {
    inner: Mutex<StreamInner>,
    waiter_token: AtomicU64,
}

impl Stream {
    pub fn new() -> Self {
        Stream::default()
    }

    /// Resolves the requested id against the stream head, appends the entry
    /// and wakes every pending waiter with it exactly once.
    pub async fn append(
        &self,
        requested: RequestedId,
        fields: Vec<(String, String)>,
    ) -> Result<StreamId, StreamError> {
        let mut inner = self.inner.lock().await;

        let last = inner.entries.last().map(|entry| entry.id);
        let id = generate_id(requested, last)?;

        let entry = StreamEntry { id, fields };
        inner.entries.push(entry.clone());

        for waiter in inner.waiters.drain(..) {
            // A waiter that timed out in the meantime has dropped its
            // receiver; the failed send is the drop of our clone.
            let _ = waiter.slot.send(entry.clone());
        }

        Ok(id)
    }

    pub async fn last_id(&self) -> Option<StreamId> {
        let inner = self.inner.lock().await;
        inner.entries.last().map(|entry| entry.id)
    }

    /// Entries with `start <= id <= end`; a missing bound is open-ended.
    pub async fn get_range_inclusive(
        &self,
        start: Option<StreamId>,
        end: Option<StreamId>,
    ) -> Vec<StreamEntry> {
        let inner = self.inner.lock().await;

        inner
            .entries
            .iter()
            .filter(|entry| start.is_none_or(|s| entry.id >= s))
            .filter(|entry| end.is_none_or(|e| entry.id <= e))
            .cloned()
            .collect()
    }

    /// Entries with `start < id < end`; a missing bound is open-ended.
    pub async fn get_range_exclusive(
        &self,
        start: Option<StreamId>,
        end: Option<StreamId>,
    ) -> Vec<StreamEntry> {
        let inner = self.inner.lock().await;

        inner
            .entries
            .iter()
            .filter(|entry| start.is_none_or(|s| entry.id > s))
            .filter(|entry| end.is_none_or(|e| entry.id < e))
            .cloned()
            .collect()
    }

    /// Registers a single-delivery slot and waits up to `timeout_ms`
    /// (0 = forever) for the next appended entry. The slot is removed from
    /// the waiter set before returning on every path.
    pub async fn block_until_new(&self, timeout_ms: u64) -> Option<StreamEntry> {
        let (sender, receiver) = oneshot::channel();
        let token = self.waiter_token.fetch_add(1, Ordering::Relaxed);

        {
            let mut inner = self.inner.lock().await;
            inner.waiters.push(Waiter {
                token,
                slot: sender,
            });
        }

        let received = if timeout_ms == 0 {
            receiver.await.ok()
        } else {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), receiver).await {
                Ok(result) => result.ok(),
                Err(_) => None,
            }
        };

        if received.is_none() {
            // Timed out: the slot may still be registered.
            let mut inner = self.inner.lock().await;
            inner.waiters.retain(|waiter| waiter.token != token);
        }

        received
    }
}

/// Resolves a requested id against the last id of the stream.
fn generate_id(
    requested: RequestedId,
    last: Option<StreamId>,
) -> Result<StreamId, StreamError> {
    match requested {
        RequestedId::Explicit(id) => {
            if id <= StreamId::new(0, 0) {
                return Err(StreamError::IdBelowMinimum);
            }

            if last.is_some_and(|last| id <= last) {
                return Err(StreamError::IdNotGreaterThanLast);
            }

            Ok(id)
        }
        RequestedId::PartialAuto { ms } => match last {
            None => {
                let seq = if ms == 0 { 1 } else { 0 };
                Ok(StreamId::new(ms, seq))
            }
            Some(last) => {
                if ms < last.ms {
                    return Err(StreamError::IdNotGreaterThanLast);
                }

                if ms == last.ms {
                    Ok(StreamId::new(ms, last.seq + 1))
                } else {
                    Ok(StreamId::new(ms, 0))
                }
            }
        },
        RequestedId::FullAuto => {
            let ms = jiff::Timestamp::now().as_millisecond() as u64;

            match last {
                Some(last) if last.ms == ms => Ok(StreamId::new(ms, last.seq + 1)),
                _ => Ok(StreamId::new(ms, 0)),
            }
        }
    }
}
