//! RDB snapshot support: parsing an on-disk image into the keyspace at boot,
//! plus the canonical empty image served to replicas during PSYNC.
//!
//! Only the subset of the format the server needs is recognized: the aux
//! preamble, database selectors, resize hints, string values and both expiry
//! opcodes. Unsupported value types or encodings fail the load; the caller
//! logs the failure and starts with an empty keyspace.

mod encoding;
mod loader;
mod opcode;
mod parser;

pub use loader::{EMPTY_RDB, load_rdb_file};
pub use parser::{RdbEntry, RdbSnapshot, parse_rdb};
