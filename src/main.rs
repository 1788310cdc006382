use tracing::error;
use tracing_subscriber::EnvFilter;

use rudis::server::{RedisServer, ServerConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match ServerConfig::from_args(std::env::args()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid arguments: {}", error);
            std::process::exit(1);
        }
    };

    let server = RedisServer::new(config);

    if let Err(error) = server.run().await {
        error!(error = %error, "server terminated");
        std::process::exit(1);
    }
}
