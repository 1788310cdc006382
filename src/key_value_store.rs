//! The keyspace: a mapping from keys to typed values with millisecond expiry.
//!
//! A single mutex (taken by the caller, which holds the store as
//! `Arc<Mutex<KeyValueStore>>`) protects both the value map and the expiry
//! map. Expiry is lazy: read paths check the deadline and remove the key if
//! it has passed, so an expired key is indistinguishable from an absent one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::stream::Stream;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// A value stored in the keyspace.
///
/// Streams are shared with blocked readers, so they live behind an `Arc`;
/// the stream's own mutex serializes access to its entries and waiters.
#[derive(Debug, Clone)]
pub enum DataType {
    String(String),
    Int(i64),
    Stream(Arc<Stream>),
}

impl DataType {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String(_) => "string",
            DataType::Int(_) => "int",
            DataType::Stream(_) => "stream",
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyValueStore {
    values: HashMap<String, DataType>,
    expirations: HashMap<String, Instant>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        KeyValueStore {
            values: HashMap::new(),
            expirations: HashMap::new(),
        }
    }

    /// Returns a stringified view of the value: strings verbatim, integers in
    /// base 10. Streams have no string form and report a type error.
    pub fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        match self.get_entry(key) {
            Some(DataType::String(s)) => Ok(Some(s)),
            Some(DataType::Int(i)) => Ok(Some(i.to_string())),
            Some(DataType::Stream(_)) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Returns the typed value for `key`, honouring expiry.
    pub fn get_entry(&mut self, key: &str) -> Option<DataType> {
        if self.evict_if_expired(key) {
            return None;
        }

        self.values.get(key).cloned()
    }

    /// Stores `value` under `key` without an expiry, clearing any prior one.
    pub fn set(&mut self, key: String, value: DataType) {
        self.expirations.remove(&key);
        self.values.insert(key, value);
    }

    /// Stores `value` under `key`, expiring `px_ms` milliseconds from now.
    pub fn set_px(&mut self, key: String, value: DataType, px_ms: u64) {
        self.expirations
            .insert(key.clone(), Instant::now() + Duration::from_millis(px_ms));
        self.values.insert(key, value);
    }

    pub fn delete(&mut self, key: &str) {
        self.values.remove(key);
        self.expirations.remove(key);
    }

    /// Returns "string", "int", "stream" or "none" for a missing key.
    pub fn get_type(&mut self, key: &str) -> &'static str {
        match self.get_entry(key) {
            Some(value) => value.type_name(),
            None => "none",
        }
    }

    /// Snapshot of all currently-present keys, unordered.
    pub fn keys(&mut self) -> Vec<String> {
        let expired: Vec<String> = self
            .values
            .keys()
            .filter(|key| self.is_expired(key))
            .cloned()
            .collect();

        for key in expired {
            self.delete(&key);
        }

        self.values.keys().cloned().collect()
    }

    fn is_expired(&self, key: &str) -> bool {
        match self.expirations.get(key) {
            Some(deadline) => Instant::now() > *deadline,
            None => false,
        }
    }

    fn evict_if_expired(&mut self, key: &str) -> bool {
        if self.is_expired(key) {
            self.delete(key);
            return true;
        }

        false
    }
}
