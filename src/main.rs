use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bosh_vault::{
    api::start_api_server,
    config,
    observability::{init_logging, log_config_info},
    service::CredentialService,
    store::build_store,
    APP_NAME, VERSION,
};
use clap::Parser;
use tracing::{info, warn};

/// BOSH config server backed by Vault
#[derive(Debug, Parser)]
#[command(name = "bosh-vault", version, about)]
struct Cli {
    /// Configuration file (YAML, JSON or TOML)
    #[arg(short, long, env = "BV_CONFIG")]
    config: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Fails only when another provider won the race, which is fine.
        let _ = ring::default_provider().install_default();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_rustls_provider();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref()).context("failed to load configuration")?;

    if cli.print_config {
        print!("{}", serde_yaml::to_string(&config).context("failed to render configuration")?);
        return Ok(());
    }

    init_logging(&config.log).context("failed to initialize logging")?;
    info!(app_name = APP_NAME, version = VERSION, "Starting bosh-vault");
    if let Some(path) = cli.config.as_deref().filter(|p| !p.exists()) {
        warn!(path = %path.display(), "Config file not found, running with defaults and environment");
    }
    log_config_info(&config);

    let store = build_store(&config).await.context("default secret backend is unavailable")?;
    let service = Arc::new(CredentialService::new(store, config.credentials.clone()));

    start_api_server(&config.api, service).await.context("API server failed")?;
    Ok(())
}
