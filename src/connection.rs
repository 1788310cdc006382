//! Per-connection read→parse→execute→write loops.
//!
//! The master loop serves clients accepted by the listener. A connection
//! that sends `REPLCONF listening-port` is handed over to the replica
//! registry and leaves this loop for good. The replica loop consumes the
//! command stream a replica receives from its master; it never responds
//! except to GETACK.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tracing::{debug, warn};

use crate::commands::{CommandExecutor, CommandHandler};
use crate::replication::{MasterConnection, ReplicaRegistry};
use crate::resp::{RespError, RespReader};
use crate::server::ServerConfig;
use crate::transactions::{
    ConnectionTransaction, GlobalTransactionLock, execute_transactional_command,
};

pub async fn handle_client_connection(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    executor: Arc<CommandExecutor>,
    replicas: Arc<ReplicaRegistry>,
    global_lock: Arc<GlobalTransactionLock>,
) {
    let peer = stream
        .peer_addr()
        .map(|address| address.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (read_half, mut writer) = stream.into_split();
    let mut reader = RespReader::new(BufReader::new(read_half));
    let mut transaction = ConnectionTransaction::new();

    loop {
        let (value, raw) = match reader.read_value().await {
            Ok(frame) => frame,
            Err(RespError::ConnectionClosed) => {
                debug!(%peer, "client disconnected");
                return;
            }
            Err(error) => {
                warn!(%peer, error = %error, "protocol error, closing connection");
                return;
            }
        };

        let command = match CommandHandler::new(&value, raw) {
            Ok(command) => command,
            Err(error) => {
                warn!(%peer, error = %error, "unparsable command, closing connection");
                return;
            }
        };

        if config.is_master() && command.is_replica_attachment() {
            let listening_port = command
                .replconf_value("listening-port")
                .and_then(|port| port.parse::<u16>().ok());

            let Some(listening_port) = listening_port else {
                warn!(%peer, "replica sent an invalid listening-port, closing");
                return;
            };

            let repl_id = config.repl_id.as_deref().unwrap_or_default();
            if let Err(error) = replicas
                .attach(reader, writer, listening_port, repl_id)
                .await
            {
                warn!(%peer, error = %error, "replica attachment failed");
            }

            // The registry owns the socket now.
            return;
        }

        if transaction.should_consume(&command) {
            let response = execute_transactional_command(
                &command,
                &mut transaction,
                &global_lock,
                &executor,
            )
            .await;

            if write_response(&mut writer, &response.encode()).await.is_err() {
                return;
            }
            continue;
        }

        let response = executor.execute(&command, true).await;

        if command.is_write_command() {
            replicas.propagate(&command.raw).await;
        }

        if let Some(response) = response {
            if write_response(&mut writer, &response.encode()).await.is_err() {
                return;
            }
        }
    }
}

/// Consumes commands propagated by the master, executing them silently and
/// answering only GETACK with the current processed-bytes offset.
pub async fn handle_master_connection(
    connection: MasterConnection,
    executor: Arc<CommandExecutor>,
) {
    let MasterConnection {
        mut reader,
        mut writer,
    } = connection;

    loop {
        let (value, raw) = match reader.read_value().await {
            Ok(frame) => frame,
            Err(RespError::ConnectionClosed) => {
                warn!("master connection closed");
                return;
            }
            Err(error) => {
                warn!(error = %error, "protocol error on master connection");
                return;
            }
        };

        let command = match CommandHandler::new(&value, raw) {
            Ok(command) => command,
            Err(error) => {
                warn!(error = %error, "unparsable command from master");
                return;
            }
        };

        if let Some(response) = executor.execute(&command, false).await {
            if write_response(&mut writer, &response.encode()).await.is_err() {
                return;
            }
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &str) -> tokio::io::Result<()> {
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;

    Ok(())
}
