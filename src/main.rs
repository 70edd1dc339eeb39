use overpass_server::config::OverpassConfig;
use overpass_server::protocol::registry::ServiceRegistry;
use overpass_server::service::EchoService;
use overpass_server::utils::logging;
use overpass_server::{Result, Server};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("overpass-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = OverpassConfig::from_env()?;
    config.validate_strict()?;
    logging::init(&config.logging)?;

    let mut services = ServiceRegistry::new();
    EchoService::new().register(&mut services)?;

    tracing::info!(app = %config.logging.app_name, "Starting");
    Server::new(config.server, services)?.start().await
}
