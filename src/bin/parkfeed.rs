use anyhow::Result;
use clap::Parser;
use parkfeed::app::App;
use parkfeed::utils::config_loader;
use parkfeed::utils::logging;
use parkfeed::utils::logging::LogLevel;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "parkfeed.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Read args, load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Build services
    // -------------------------------

    let app = App::build(service_config).await?;

    // -------------------------------
    // 3. Health check, authenticate, start loops and http server
    // -------------------------------

    let authenticated = app.start().await?;
    info!("service running, authenticated: {}", authenticated);

    // -------------------------------
    // 4. Wait for a signal, then stop everything
    // -------------------------------

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown ..."),
        _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown ..."),
        _ = app.cancelled() => {}
    }

    app.shutdown().await;
    Ok(())
}
