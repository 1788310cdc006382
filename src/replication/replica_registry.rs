//! Master-side replica bookkeeping: attachment, propagation and WAIT.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::{debug, info, warn};

use crate::rdb::EMPTY_RDB;
use crate::resp::{RespError, RespReader, RespValue};

/// The literal `REPLCONF GETACK *` frame sent to replicas during WAIT.
const GETACK_FRAME: &[u8] = b"*3\r\n$8\r\nREPLCONF\r\n$6\r\nGETACK\r\n$1\r\n*\r\n";

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("I/O error during replica attachment: {0}")]
    Io(String),
    #[error("unexpected frame during replica attachment: {0}")]
    UnexpectedFrame(String),
    #[error("protocol error on replica connection")]
    Resp(#[from] RespError),
}

impl From<std::io::Error> for ReplicationError {
    fn from(error: std::io::Error) -> Self {
        ReplicationError::Io(error.to_string())
    }
}

/// Write side and byte accounting for one attached replica.
///
/// `bytes_sent` counts propagation bytes written to the socket; the mutex
/// keeps the write and the accounting atomic. `first_getack_pending`
/// suppresses counting the very first GETACK so the master's ledger stays
/// aligned with the replica's post-RDB counter (the replica never counts the
/// handshake or the RDB image).
#[derive(Debug)]
struct ReplicaLink {
    writer: OwnedWriteHalf,
    bytes_sent: u64,
    first_getack_pending: bool,
}

#[derive(Debug)]
pub struct Replica {
    listening_port: u16,
    link: Mutex<ReplicaLink>,
    bytes_acked: AtomicU64,
    ack_signal: Notify,
}

impl Replica {
    fn new(writer: OwnedWriteHalf, listening_port: u16) -> Self {
        Replica {
            listening_port,
            link: Mutex::new(ReplicaLink {
                writer,
                bytes_sent: 0,
                first_getack_pending: true,
            }),
            bytes_acked: AtomicU64::new(0),
            ack_signal: Notify::new(),
        }
    }

    fn bytes_acked(&self) -> u64 {
        self.bytes_acked.load(Ordering::SeqCst)
    }
}

/// The ordered list of replicas attached to this master.
#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    replicas: Mutex<Vec<Arc<Replica>>>,
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        ReplicaRegistry::default()
    }

    pub async fn count(&self) -> usize {
        self.replicas.lock().await.len()
    }

    /// Completes the replication handshake on a connection whose
    /// `REPLCONF listening-port` has already been consumed, then retains the
    /// connection as a replica and spawns its ACK reader loop.
    ///
    /// Sequence: `+OK` for the listening-port, read `REPLCONF capa …` and
    /// reply `+OK`, read `PSYNC ? -1` and reply `+FULLRESYNC <id> 0`, then
    /// write the RDB image framed as `$<N>\r\n<N bytes>` with no trailing
    /// CRLF.
    pub async fn attach(
        self: &Arc<Self>,
        mut reader: RespReader<BufReader<OwnedReadHalf>>,
        mut writer: OwnedWriteHalf,
        listening_port: u16,
        repl_id: &str,
    ) -> Result<(), ReplicationError> {
        let ok = RespValue::SimpleString("OK".to_string()).encode();
        writer.write_all(ok.as_bytes()).await?;

        let (capa, _) = reader.read_value().await?;
        expect_command(&capa, "REPLCONF")?;
        writer.write_all(ok.as_bytes()).await?;

        let (psync, _) = reader.read_value().await?;
        expect_command(&psync, "PSYNC")?;

        let full_resync =
            RespValue::SimpleString(format!("FULLRESYNC {} 0", repl_id)).encode();
        writer.write_all(full_resync.as_bytes()).await?;

        writer
            .write_all(format!("${}\r\n", EMPTY_RDB.len()).as_bytes())
            .await?;
        writer.write_all(&EMPTY_RDB).await?;
        writer.flush().await?;

        let replica = Arc::new(Replica::new(writer, listening_port));
        self.replicas.lock().await.push(Arc::clone(&replica));

        let replica_count = self.count().await;
        info!(listening_port, replicas = replica_count, "replica attached");

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            read_acks(registry, replica, reader).await;
        });

        Ok(())
    }

    /// Forwards the literal bytes of a write command to every replica, in
    /// execution order. A replica whose socket fails is dropped.
    pub async fn propagate(&self, raw: &Bytes) {
        let snapshot: Vec<Arc<Replica>> = self.replicas.lock().await.clone();

        for replica in snapshot {
            let mut link = replica.link.lock().await;

            let written = async {
                link.writer.write_all(raw).await?;
                link.writer.flush().await
            }
            .await;

            match written {
                Ok(()) => {
                    link.bytes_sent += raw.len() as u64;
                    debug!(
                        listening_port = replica.listening_port,
                        bytes_sent = link.bytes_sent,
                        "propagated write"
                    );
                }
                Err(error) => {
                    drop(link);
                    warn!(
                        listening_port = replica.listening_port,
                        error = %error,
                        "dropping replica after propagation failure"
                    );
                    self.remove(&replica).await;
                }
            }
        }
    }

    /// Counts how many replicas have acknowledged everything sent to them,
    /// up to `num_replicas`, waiting at most `timeout` (None = forever) for
    /// the rest. Outstanding per-replica tasks are cancelled on timeout.
    pub async fn wait(&self, num_replicas: usize, timeout: Option<Duration>) -> usize {
        let snapshot: Vec<Arc<Replica>> = self.replicas.lock().await.clone();
        if snapshot.is_empty() {
            return 0;
        }

        let target = num_replicas.min(snapshot.len());
        if target == 0 {
            return 0;
        }

        let (ack_sender, mut ack_receiver) = mpsc::channel::<()>(snapshot.len());
        let mut tasks = Vec::with_capacity(snapshot.len());

        for replica in snapshot {
            let ack_sender = ack_sender.clone();
            tasks.push(tokio::spawn(async move {
                if await_in_sync(&replica).await {
                    let _ = ack_sender.send(()).await;
                }
            }));
        }
        drop(ack_sender);

        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut acknowledged = 0;

        while acknowledged < target {
            let received = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, ack_receiver.recv()).await {
                        Ok(received) => received,
                        Err(_) => break,
                    }
                }
                None => ack_receiver.recv().await,
            };

            match received {
                Some(()) => acknowledged += 1,
                None => break,
            }
        }

        for task in &tasks {
            task.abort();
        }

        debug!(acknowledged, target, "WAIT finished");
        acknowledged
    }

    async fn remove(&self, target: &Arc<Replica>) {
        let mut replicas = self.replicas.lock().await;
        replicas.retain(|replica| !Arc::ptr_eq(replica, target));
    }
}

/// One WAIT task: reports immediately when the replica is already in sync,
/// otherwise asks for an ACK and waits for the reader loop's signal.
async fn await_in_sync(replica: &Replica) -> bool {
    {
        let mut link = replica.link.lock().await;

        if link.bytes_sent == replica.bytes_acked() {
            return true;
        }

        let sent = async {
            link.writer.write_all(GETACK_FRAME).await?;
            link.writer.flush().await
        }
        .await;

        if sent.is_err() {
            return false;
        }

        if link.first_getack_pending {
            link.first_getack_pending = false;
        } else {
            link.bytes_sent += GETACK_FRAME.len() as u64;
        }
    }

    replica.ack_signal.notified().await;
    true
}

/// Reader loop for one replica socket: records `REPLCONF ACK <n>` offsets
/// and wakes any WAIT task parked on this replica.
async fn read_acks(
    registry: Arc<ReplicaRegistry>,
    replica: Arc<Replica>,
    mut reader: RespReader<BufReader<OwnedReadHalf>>,
) {
    loop {
        match reader.read_value().await {
            Ok((value, _)) => {
                if let Some(offset) = parse_ack(&value) {
                    replica.bytes_acked.store(offset, Ordering::SeqCst);
                    replica.ack_signal.notify_one();
                    debug!(
                        listening_port = replica.listening_port,
                        bytes_acked = offset,
                        "replica acknowledged"
                    );
                }
            }
            Err(error) => {
                warn!(
                    listening_port = replica.listening_port,
                    error = %error,
                    "replica connection closed"
                );
                registry.remove(&replica).await;
                return;
            }
        }
    }
}

fn expect_command(value: &RespValue, name: &str) -> Result<(), ReplicationError> {
    let RespValue::Array(parts) = value else {
        return Err(ReplicationError::UnexpectedFrame(format!("{:?}", value)));
    };

    match parts.first() {
        Some(RespValue::BulkString(command)) if command.eq_ignore_ascii_case(name) => Ok(()),
        _ => Err(ReplicationError::UnexpectedFrame(format!("{:?}", value))),
    }
}

fn parse_ack(value: &RespValue) -> Option<u64> {
    let RespValue::Array(parts) = value else {
        return None;
    };

    match parts.as_slice() {
        [
            RespValue::BulkString(command),
            RespValue::BulkString(key),
            RespValue::BulkString(offset),
        ] if command.eq_ignore_ascii_case("replconf") && key.eq_ignore_ascii_case("ack") => {
            offset.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    use super::{GETACK_FRAME, ReplicaRegistry, parse_ack};
    use crate::rdb::EMPTY_RDB;
    use crate::resp::{RespReader, RespValue};

    #[test]
    fn test_parse_ack() {
        let ack = RespValue::Array(vec![
            RespValue::BulkString("REPLCONF".to_string()),
            RespValue::BulkString("ACK".to_string()),
            RespValue::BulkString("154".to_string()),
        ]);
        assert_eq!(parse_ack(&ack), Some(154));

        let test_cases = vec![
            RespValue::SimpleString("OK".to_string()),
            RespValue::Array(vec![RespValue::BulkString("REPLCONF".to_string())]),
            RespValue::Array(vec![
                RespValue::BulkString("REPLCONF".to_string()),
                RespValue::BulkString("ACK".to_string()),
                RespValue::BulkString("lots".to_string()),
            ]),
        ];

        for value in test_cases {
            assert_eq!(parse_ack(&value), None, "parsing {:?}", value);
        }
    }

    #[test]
    fn test_getack_frame_is_canonical() {
        let expected = RespValue::Array(vec![
            RespValue::BulkString("REPLCONF".to_string()),
            RespValue::BulkString("GETACK".to_string()),
            RespValue::BulkString("*".to_string()),
        ]);
        assert_eq!(GETACK_FRAME, expected.encode().as_bytes());
    }

    #[tokio::test]
    async fn test_wait_with_no_replicas_is_zero() {
        let registry = ReplicaRegistry::new();
        assert_eq!(registry.wait(3, Some(Duration::from_millis(50))).await, 0);
    }

    /// Drives the replica half of an attachment over a real socket pair and
    /// verifies the master-side byte stream.
    #[tokio::test]
    async fn test_attach_then_propagate_and_wait() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let registry = Arc::new(ReplicaRegistry::new());

        let master_registry = Arc::clone(&registry);
        let master = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, write_half) = stream.into_split();
            let reader = RespReader::new(BufReader::new(read_half));

            master_registry
                .attach(reader, write_half, 6380, "a".repeat(40).as_str())
                .await
                .unwrap();
        });

        let mut replica = TcpStream::connect(address).await.unwrap();

        // The loop consumed `REPLCONF listening-port` already; the registry
        // starts by acknowledging it.
        let mut ok = [0u8; 5];
        replica.read_exact(&mut ok).await.unwrap();
        assert_eq!(&ok, b"+OK\r\n");

        replica
            .write_all(b"*3\r\n$8\r\nREPLCONF\r\n$4\r\ncapa\r\n$6\r\npsync2\r\n")
            .await
            .unwrap();
        replica.read_exact(&mut ok).await.unwrap();
        assert_eq!(&ok, b"+OK\r\n");

        replica
            .write_all(b"*3\r\n$5\r\nPSYNC\r\n$1\r\n?\r\n$2\r\n-1\r\n")
            .await
            .unwrap();

        let mut fullresync = vec![0u8; "+FULLRESYNC  0\r\n".len() + 40];
        replica.read_exact(&mut fullresync).await.unwrap();
        assert!(fullresync.starts_with(b"+FULLRESYNC "));

        let header = format!("${}\r\n", EMPTY_RDB.len());
        let mut rdb = vec![0u8; header.len() + EMPTY_RDB.len()];
        replica.read_exact(&mut rdb).await.unwrap();
        assert_eq!(&rdb[..header.len()], header.as_bytes());
        assert_eq!(&rdb[header.len()..], EMPTY_RDB);

        master.await.unwrap();
        assert_eq!(registry.count().await, 1);

        // A propagated write arrives byte-identical.
        let raw = Bytes::from("*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
        registry.propagate(&raw).await;

        let mut forwarded = vec![0u8; raw.len()];
        replica.read_exact(&mut forwarded).await.unwrap();
        assert_eq!(forwarded, raw);

        // WAIT sends a GETACK (uncounted the first time); answer it.
        let registry_for_wait = Arc::clone(&registry);
        let wait_task = tokio::spawn(async move {
            registry_for_wait
                .wait(1, Some(Duration::from_millis(2000)))
                .await
        });

        let mut getack = vec![0u8; GETACK_FRAME.len()];
        replica.read_exact(&mut getack).await.unwrap();
        assert_eq!(getack, GETACK_FRAME);

        let ack = format!("*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n${}\r\n{}\r\n", raw.len().to_string().len(), raw.len());
        replica.write_all(ack.as_bytes()).await.unwrap();

        assert_eq!(wait_task.await.unwrap(), 1);

        // Fully acknowledged now: a second WAIT reports in-sync immediately,
        // without another GETACK round-trip.
        assert_eq!(registry.wait(1, Some(Duration::from_millis(200))).await, 1);
    }
}
