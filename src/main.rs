use anyhow::Result;
use clap::Parser;
use classroom_genie_proxy::models::Config;
use classroom_genie_proxy::server;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "classroom-genie-proxy")]
#[command(about = "Proxy text and image generation requests to the Gemini API")]
struct CliArgs {
    /// Address to listen on. Overrides BIND_ADDR.
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "classroom_genie_proxy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting classroom-genie-proxy");

    let args = CliArgs::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    if let Err(e) = server::serve(config).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
