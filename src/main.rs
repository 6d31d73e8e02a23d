use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use clap::Parser;
use eyre::{Context, Result};
use span_gateway::{
    config::{GatewayConfig, DEFAULT_CONFIG_PATH},
    router,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file
    #[arg(long, env = "SPAN_GATEWAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from {}", cli.config);
    let config = GatewayConfig::load(&cli.config).context("Failed to load configuration")?;

    let should_terminate = Arc::new(AtomicBool::new(false));
    setup_ctrlc_handler(Arc::clone(&should_terminate))?;

    router::initialize_router(&config, should_terminate).await
}

fn setup_ctrlc_handler(should_terminate: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Received Ctrl+C");
        should_terminate.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")
}
