use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::commands::command_error::CommandError;
use crate::commands::command_handler::CommandHandler;
use crate::commands::{
    config_get::config_get, echo::echo, get::get, incr::incr, info::info, keys::keys, ping::ping,
    replconf::replconf, set::set, type_command::type_command, wait::wait, xadd::xadd,
    xrange::xrange, xread::xread,
};
use crate::key_value_store::KeyValueStore;
use crate::replication::{OffsetCounter, ReplicaRegistry};
use crate::resp::RespValue;
use crate::server::ServerConfig;

/// Dispatches parsed commands to their handlers over the shared store,
/// configuration and replica registry.
///
/// `should_respond` is true on a master serving clients and false on a
/// replica consuming the master's command stream, where handler output is
/// silenced. The offset counter observes every command before dispatch; when
/// it produces a value (a GETACK answer) that value is the response and the
/// handler is skipped. This holds even on a replica, since the ACK must
/// reach the master.
pub struct CommandExecutor {
    store: Arc<Mutex<KeyValueStore>>,
    config: Arc<ServerConfig>,
    replicas: Arc<ReplicaRegistry>,
    counter: OffsetCounter,
}

impl CommandExecutor {
    pub fn new(
        store: Arc<Mutex<KeyValueStore>>,
        config: Arc<ServerConfig>,
        replicas: Arc<ReplicaRegistry>,
    ) -> Self {
        CommandExecutor {
            store,
            config,
            replicas,
            counter: OffsetCounter::new(),
        }
    }

    pub async fn execute(
        &self,
        command: &CommandHandler,
        should_respond: bool,
    ) -> Option<RespValue> {
        debug!(command = %command.name, "executing command");

        if let Some(ack) = self.counter.observe(command) {
            return Some(ack);
        }

        let result = self.dispatch(command).await;

        if !should_respond {
            return None;
        }

        match result {
            Ok(response) => response,
            Err(error) => Some(error.as_resp()),
        }
    }

    async fn dispatch(
        &self,
        command: &CommandHandler,
    ) -> Result<Option<RespValue>, CommandError> {
        let arguments = &command.arguments;

        match command.name.as_str() {
            "PING" => Ok(Some(ping())),
            "ECHO" => echo(arguments).map(Some),
            "GET" => get(&self.store, arguments).await.map(Some),
            "SET" => set(&self.store, arguments).await.map(Some),
            "INCR" => incr(&self.store, arguments).await.map(Some),
            "KEYS" => keys(&self.store, arguments).await.map(Some),
            "TYPE" => type_command(&self.store, arguments).await.map(Some),
            "INFO" => info(&self.config, arguments).map(Some),
            "CONFIG" => config_get(&self.config, arguments).map(Some),
            "XADD" => xadd(&self.store, arguments).await.map(Some),
            "XRANGE" => xrange(&self.store, arguments).await.map(Some),
            "XREAD" => xread(&self.store, arguments).await.map(Some),
            "REPLCONF" => replconf(command),
            "WAIT" => wait(&self.config, &self.replicas, arguments).await.map(Some),
            "PSYNC" => Err(CommandError::PsyncOutsideHandshake),
            name => Err(CommandError::UnknownCommand(name.to_string())),
        }
    }
}
