use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use drt_core::{api, spawn_monitors, AppState};
use drt_delivery::{AlloyDelivery, DeliveryInterface};
use drt_types::{format_address, Config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "DRT token, trading and AliveAI backend", version)]
struct Options {
	/// Path to the configuration file (TOML)
	#[arg(long, default_value = "config/demo.toml")]
	config: PathBuf,

	/// Listen address, overrides `[server]` (e.g. 0.0.0.0:5000)
	#[arg(long)]
	bind: Option<String>,

	/// Serve the API without starting the background monitors
	#[arg(long)]
	no_monitors: bool,
}

fn resolve_config_path(path: &Path) -> Result<PathBuf> {
	if path.is_absolute() {
		Ok(path.to_path_buf())
	} else {
		let cwd = std::env::current_dir()?;
		Ok(cwd.join(path))
	}
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		warn!(error = %e, "Failed to listen for shutdown signal");
		std::future::pending::<()>().await;
	}
	info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(env_filter).init();

	let options = Options::parse();

	let config_path = resolve_config_path(&options.config)?;
	let config_path_str = config_path
		.to_str()
		.ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8: {}", config_path.display()))?;
	let config = Config::from_file(config_path_str)
		.await
		.with_context(|| format!("Failed to load config from {}", config_path.display()))?;

	let bind = options
		.bind
		.clone()
		.unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

	let delivery = AlloyDelivery::from_config(&config.network)
		.context("Failed to connect to the RPC endpoint")?;
	match delivery.signer_address() {
		Some(signer) => info!(signer = %format_address(&signer), "Loaded backend signer"),
		None => warn!("No private key configured, write endpoints are disabled"),
	}
	let chain_id = config.network.chain_id;

	let state = AppState::new(config, Arc::new(delivery)).context("Failed to build application state")?;

	let monitors = if options.no_monitors {
		info!("Background monitors disabled");
		None
	} else {
		Some(spawn_monitors(&state))
	};

	let listener = tokio::net::TcpListener::bind(&bind)
		.await
		.with_context(|| format!("Failed to bind {}", bind))?;
	info!(%bind, chain_id, "DRT backend listening");

	axum::serve(listener, api::router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("Server error")?;

	if let Some(monitors) = monitors {
		monitors.shutdown().await;
	}
	info!("DRT backend stopped");
	Ok(())
}
