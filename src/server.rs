//! Server configuration and the listener loop.
//!
//! Parses the command line (`--port`, `--replicaof`, `--dir`,
//! `--dbfilename`), wires the shared subsystems together and runs the accept
//! loop. A replica additionally performs the replication handshake before it
//! starts serving clients; failing to reach the master aborts the boot.

use std::sync::Arc;

use rand::Rng;
use regex::Regex;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commands::CommandExecutor;
use crate::connection::{handle_client_connection, handle_master_connection};
use crate::key_value_store::KeyValueStore;
use crate::rdb::load_rdb_file;
use crate::replication::{ReplicaRegistry, perform_handshake};
use crate::transactions::GlobalTransactionLock;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("invalid port flag value")]
    InvalidPortFlagValue,
    #[error("invalid master address")]
    InvalidMasterAddress,
    #[error("invalid master port")]
    InvalidMasterPort,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ServerRole {
    Master,
    Replica { host: String, port: u16 },
}

/// Immutable server configuration, fixed at boot.
#[derive(Debug, PartialEq, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub role: ServerRole,
    pub dir: String,
    pub dbfilename: String,
    /// 40-character replication id, present on masters only.
    pub repl_id: Option<String>,
}

impl ServerConfig {
    /// Parses command-line arguments (the first element is the binary name).
    ///
    /// `--replicaof` takes a single `"host port"` value; its absence makes
    /// the server a master and assigns it a fresh replication id.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut iter = args.into_iter().skip(1);

        let mut port: Option<u16> = None;
        let mut role: Option<ServerRole> = None;
        let mut dir: Option<String> = None;
        let mut dbfilename: Option<String> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };
                    port = Some(validate_port(&value, CliError::InvalidPortFlagValue)?);
                }
                "--replicaof" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };
                    let (host, master_port) = validate_master_address(&value)?;
                    role = Some(ServerRole::Replica {
                        host,
                        port: master_port,
                    });
                }
                "--dir" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };
                    dir = Some(value);
                }
                "--dbfilename" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };
                    dbfilename = Some(value);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        let role = role.unwrap_or(ServerRole::Master);
        let repl_id = match role {
            ServerRole::Master => Some(generate_repl_id()),
            ServerRole::Replica { .. } => None,
        };

        Ok(ServerConfig {
            port: port.unwrap_or(6379),
            role,
            dir: dir.unwrap_or_default(),
            dbfilename: dbfilename.unwrap_or_default(),
            repl_id,
        })
    }

    pub fn is_master(&self) -> bool {
        matches!(self.role, ServerRole::Master)
    }

    /// Redis wire terminology: a replica reports itself as "slave".
    pub fn role_name(&self) -> &'static str {
        match self.role {
            ServerRole::Master => "master",
            ServerRole::Replica { .. } => "slave",
        }
    }

    /// The key/value pairs of the INFO replication section.
    pub fn replication_info(&self) -> Vec<(String, String)> {
        let mut info = vec![("role".to_string(), self.role_name().to_string())];

        if let Some(repl_id) = &self.repl_id {
            info.push(("master_replid".to_string(), repl_id.clone()));
            info.push(("master_repl_offset".to_string(), "0".to_string()));
        }

        info
    }
}

fn generate_repl_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();

    (0..40)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}

fn validate_port(port: &str, error: CliError) -> Result<u16, CliError> {
    let port = port.parse::<u16>().map_err(|_| error.clone())?;

    if port == 0 {
        return Err(error);
    }

    Ok(port)
}

/// Validates a `"host port"` master address: an IPv4 address with in-range
/// octets, or a plain hostname.
fn validate_master_address(master_address: &str) -> Result<(String, u16), CliError> {
    let ipv4_regex =
        Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").expect("pattern is valid");
    let hostname_regex = Regex::new(r"^[a-zA-Z0-9\-\.]+$").expect("pattern is valid");

    let parts: Vec<&str> = master_address.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(CliError::InvalidMasterAddress);
    }

    let host = parts[0];

    let valid_host = if let Some(captures) = ipv4_regex.captures(host) {
        captures.iter().skip(1).all(|octet| {
            octet
                .and_then(|m| m.as_str().parse::<u16>().ok())
                .is_some_and(|value| value <= 255)
        })
    } else {
        hostname_regex.is_match(host)
    };

    if !valid_host {
        return Err(CliError::InvalidMasterAddress);
    }

    let port = validate_port(parts[1], CliError::InvalidMasterPort)?;

    Ok((host.to_string(), port))
}

/// The assembled server: configuration plus every shared subsystem.
pub struct RedisServer {
    config: Arc<ServerConfig>,
    store: Arc<Mutex<KeyValueStore>>,
    replicas: Arc<ReplicaRegistry>,
    executor: Arc<CommandExecutor>,
    global_lock: Arc<GlobalTransactionLock>,
}

impl RedisServer {
    pub fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(Mutex::new(KeyValueStore::new()));
        let replicas = Arc::new(ReplicaRegistry::new());
        let executor = Arc::new(CommandExecutor::new(
            Arc::clone(&store),
            Arc::clone(&config),
            Arc::clone(&replicas),
        ));

        RedisServer {
            config,
            store,
            replicas,
            executor,
            global_lock: Arc::new(GlobalTransactionLock::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Boots the server and serves connections until the process exits.
    ///
    /// Boot order: load the RDB snapshot (failures are logged, never fatal),
    /// run the replication handshake when configured as a replica (fatal on
    /// failure), then bind the listener and accept clients forever.
    pub async fn run(&self) -> std::io::Result<()> {
        if !self.config.dbfilename.is_empty() {
            match load_rdb_file(&self.config.dir, &self.config.dbfilename, &self.store).await {
                Ok(loaded) => info!(loaded, "loaded RDB snapshot"),
                Err(error) => {
                    warn!(error = %error, "failed to load RDB snapshot, starting empty")
                }
            }
        }

        if let ServerRole::Replica { host, port } = &self.config.role {
            let connection = perform_handshake(host, *port, self.config.port)
                .await
                .map_err(|error| std::io::Error::other(error.to_string()))?;

            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                handle_master_connection(connection, executor).await;
            });
        }

        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        info!(
            port = self.config.port,
            role = self.config.role_name(),
            "server listening"
        );

        loop {
            match listener.accept().await {
                Ok((stream, address)) => {
                    debug!(peer = %address, "accepted connection");

                    let config = Arc::clone(&self.config);
                    let executor = Arc::clone(&self.executor);
                    let replicas = Arc::clone(&self.replicas);
                    let global_lock = Arc::clone(&self.global_lock);

                    tokio::spawn(async move {
                        handle_client_connection(
                            stream,
                            config,
                            executor,
                            replicas,
                            global_lock,
                        )
                        .await;
                    });
                }
                Err(error) => {
                    warn!(error = %error, "failed to accept connection");
                }
            }
        }
    }
}
