//! A Redis-compatible in-memory data server.
//!
//! This crate implements the core of a single-node Redis server:
//!
//! - The RESP wire protocol (parsing and serialization)
//! - A key-value store with millisecond expiry (SET/GET/INCR/KEYS/TYPE)
//! - Append-only streams with blocking reads (XADD/XRANGE/XREAD)
//! - Per-connection transactions (MULTI/EXEC/DISCARD)
//! - Master-replica replication with acknowledged propagation (WAIT)
//! - RDB snapshot loading at boot
//!
//! Each TCP connection runs on its own Tokio task. The server listens with
//! RESP framing, turns frames into typed commands and dispatches them to the
//! command executor over the shared store. On a master, executed writes are
//! also forwarded byte-for-byte to every attached replica.

pub mod commands;
pub mod connection;
pub mod key_value_store;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod stream;
pub mod transactions;
