use std::sync::Arc;
use std::time::Duration;

use crate::commands::command_error::CommandError;
use crate::replication::ReplicaRegistry;
use crate::resp::RespValue;
use crate::server::ServerConfig;

pub struct WaitArguments {
    num_replicas: usize,
    timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("wait"));
        }

        let num_replicas = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::NotAnInteger)?;

        let timeout_ms = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidTimeout)?;

        // Timeout 0 blocks until enough replicas have acknowledged.
        let timeout = match timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(Self {
            num_replicas,
            timeout,
        })
    }
}

/// WAIT reports how many replicas have acknowledged every byte propagated so
/// far, waiting up to the timeout for stragglers.
pub async fn wait(
    config: &ServerConfig,
    replicas: &Arc<ReplicaRegistry>,
    arguments: &[String],
) -> Result<RespValue, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    if !config.is_master() {
        return Err(CommandError::WaitOnReplica);
    }

    let acknowledged = replicas
        .wait(wait_arguments.num_replicas, wait_arguments.timeout)
        .await;

    Ok(RespValue::Integer(acknowledged as i64))
}
