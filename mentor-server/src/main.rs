//! Issue mentor HTTP server - standalone binary

use std::path::PathBuf;

use clap::Parser;
use config::{PathManager, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (0 for random)
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Log level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also append backend traffic summaries to the default log file
    #[arg(long)]
    traffic_log: bool,

    /// Override the data directory (logs, settings)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Write the effective settings to settings.toml and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(dir) = args.data_dir.clone() {
        PathManager::set_data_dir(dir);
    }
    config::load_env_file();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if args.traffic_log {
        PathManager::ensure_dirs_exist()?;
        match llm::traffic_log::enable_file_log(None) {
            Some(path) => tracing::info!("Logging backend traffic to {}", path.display()),
            None => tracing::warn!("No log directory available, traffic log disabled"),
        }
    }

    let settings = Settings::load_with_env().map_err(anyhow::Error::msg)?;
    if args.init_config {
        settings.save().map_err(anyhow::Error::msg)?;
        if let Some(path) = PathManager::settings_path() {
            println!("Wrote settings to {}", path.display());
        }
        return Ok(());
    }
    let services = mentor_server::build_services(&settings)?;

    let handle = mentor_server::start_server_on(&args.host, args.port, services.state).await?;

    println!("Mentor server running at {}", handle.url());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    handle.stop().await;
    services.sweeper.stop().await;
    Ok(())
}
