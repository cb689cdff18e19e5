use anyhow::Result;
use clap::Parser;
use intela_daemon::{
    Server, Settings,
    telemetry::{default_log_level, init_tracing},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

/// Intela web - marketing site, client portal and blog
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(short = 'b', long = "bind")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(default_log_level(settings.debug))?;

    if let Some(path) = &cli.config {
        info!("Loaded configuration from: {}", path.display());
    }
    if settings.debug {
        info!("Debug mode enabled");
        settings.log_summary();
    }

    let server = Server::builder()
        .with_settings(settings)
        .with_bind(cli.bind)
        .build()
        .await?;

    println!("Server running at: http://{}/", server.local_addr()?);

    server
        .serve(async {
            // Wait for Ctrl+C
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}
