//! Command parsing and execution.
//!
//! Every supported command has its own module with an `XxxArguments::parse`
//! constructor (the typed view of the raw argument list) and a handler
//! function. [`CommandHandler`] is the parsed wire command; the
//! [`CommandExecutor`] dispatches it to the right handler over the shared
//! store, configuration and replica registry.

mod command_error;
mod command_executor;
mod command_handler;
mod config_get;
mod echo;
mod get;
mod incr;
mod info;
mod keys;
mod ping;
mod replconf;
mod set;
mod type_command;
mod wait;
mod xadd;
mod xrange;
mod xread;

pub use command_error::CommandError;
pub use command_executor::CommandExecutor;
pub use command_handler::CommandHandler;
