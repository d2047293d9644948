use anyhow::Result;
use clap::Parser;
use questadmin_media::{app, config::Config, server};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "questadmin-media")]
#[command(about = "Course image upload service for QuestAdmin")]
struct CliArgs {
    /// Address to listen on; overrides BIND_ADDR.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "questadmin_media=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    info!("Starting questadmin-media");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let bind_addr = args.bind.unwrap_or_else(|| config.bind_addr.clone());

    let service = match app::build_service(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(service, &bind_addr).await {
        error!("Server stopped: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
