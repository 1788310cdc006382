//! Loading an RDB file into the keyspace at boot.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::io;
use tokio::sync::Mutex;
use tracing::debug;

use crate::key_value_store::{DataType, KeyValueStore};
use crate::rdb::parser::parse_rdb;

/// The canonical empty RDB image (Redis 7.2 header, no keys), served to
/// replicas during PSYNC when the master has nothing to snapshot.
pub const EMPTY_RDB: [u8; 88] = [
    0x52, 0x45, 0x44, 0x49, 0x53, 0x30, 0x30, 0x31, 0x31, 0xfa, 0x09, 0x72,
    0x65, 0x64, 0x69, 0x73, 0x2d, 0x76, 0x65, 0x72, 0x05, 0x37, 0x2e, 0x32,
    0x2e, 0x30, 0xfa, 0x0a, 0x72, 0x65, 0x64, 0x69, 0x73, 0x2d, 0x62, 0x69,
    0x74, 0x73, 0xc0, 0x40, 0xfa, 0x05, 0x63, 0x74, 0x69, 0x6d, 0x65, 0xc2,
    0x6d, 0x08, 0xbc, 0x65, 0xfa, 0x08, 0x75, 0x73, 0x65, 0x64, 0x2d, 0x6d,
    0x65, 0x6d, 0xc2, 0xb0, 0xc4, 0x10, 0x00, 0xfa, 0x08, 0x61, 0x6f, 0x66,
    0x2d, 0x62, 0x61, 0x73, 0x65, 0xc0, 0x00, 0xff, 0xf0, 0x6e, 0x3b, 0xfe,
    0xc0, 0xff, 0x5a, 0xa2,
];

/// Reads `<dir>/<dbfilename>` and inserts its records into the store.
///
/// Records with an absolute expiry become TTLs relative to now, clamped at
/// zero so an already-past expiry is immediately lazy-deleted on first read.
/// Returns the number of loaded records; the caller decides how to report
/// errors (a failed load never aborts the server).
pub async fn load_rdb_file(
    dir: &str,
    dbfilename: &str,
    store: &Arc<Mutex<KeyValueStore>>,
) -> io::Result<usize> {
    let path = Path::new(dir).join(dbfilename);
    let bytes = fs::read(&path).await?;

    let snapshot = parse_rdb(&bytes)?;
    let now = jiff::Timestamp::now();

    let mut store_guard = store.lock().await;
    let loaded = snapshot.entries.len();

    for entry in snapshot.entries {
        debug!(key = %entry.key, "loading RDB record");

        match entry.expires_at {
            Some(expires_at) => {
                let remaining_ms =
                    (expires_at.as_millisecond() - now.as_millisecond()).max(0) as u64;
                store_guard.set_px(entry.key, DataType::String(entry.value), remaining_ms);
            }
            None => {
                store_guard.set(entry.key, DataType::String(entry.value));
            }
        }
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::{EMPTY_RDB, load_rdb_file};
    use crate::key_value_store::KeyValueStore;

    #[tokio::test]
    async fn test_load_missing_file_errors_without_touching_store() {
        let store = Arc::new(Mutex::new(KeyValueStore::new()));

        let result = load_rdb_file("/nonexistent", "missing.rdb", &store).await;

        assert!(result.is_err());
        assert_eq!(store.lock().await.keys(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_load_populates_store() {
        let dir = std::env::temp_dir().join("rudis-rdb-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"REDIS0011");
        bytes.push(0xFE);
        bytes.push(0x00);
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x05fruit\x05mango");
        bytes.push(0xFF);
        bytes.extend_from_slice(&[0; 8]);

        let path = dir.join("dump.rdb");
        tokio::fs::write(&path, &bytes).await.unwrap();

        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let loaded = load_rdb_file(dir.to_str().unwrap(), "dump.rdb", &store)
            .await
            .unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(
            store.lock().await.get("fruit"),
            Ok(Some("mango".to_string()))
        );
    }

    #[tokio::test]
    async fn test_load_empty_rdb_yields_no_keys() {
        let dir = std::env::temp_dir().join("rudis-rdb-empty-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("empty.rdb"), EMPTY_RDB).await.unwrap();

        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let loaded = load_rdb_file(dir.to_str().unwrap(), "empty.rdb", &store)
            .await
            .unwrap();

        assert_eq!(loaded, 0);
        assert_eq!(store.lock().await.keys(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_load_record_with_past_expiry_is_absent() {
        let dir = std::env::temp_dir().join("rudis-rdb-expired-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"REDIS0011");
        bytes.push(0xFE);
        bytes.push(0x00);
        bytes.push(0xFC);
        // An expiry far in the past.
        bytes.extend_from_slice(&1_000u64.to_le_bytes());
        bytes.push(0x00);
        bytes.extend_from_slice(b"\x04gone\x01v");
        bytes.push(0xFF);
        bytes.extend_from_slice(&[0; 8]);

        tokio::fs::write(dir.join("expired.rdb"), &bytes).await.unwrap();

        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        load_rdb_file(dir.to_str().unwrap(), "expired.rdb", &store)
            .await
            .unwrap();

        assert_eq!(store.lock().await.get("gone"), Ok(None));
    }
}
