//! Main entry point for the EcoSpin order service.
//!
//! Serves the order API backed by the configured storage implementation, or
//! with the `migrate` subcommand copies data from one storage implementation
//! to another and exits.

use clap::{Parser, Subcommand};
use ecospin_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "ECOSPIN_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
	/// Copy every order and the counter between two configured storage
	/// implementations
	Migrate {
		/// Storage implementation to read from
		#[arg(long, default_value = "file")]
		from: String,
		/// Storage implementation to write to
		#[arg(long, default_value = "sqlite")]
		to: String,
	},
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Runs the requested command until it completes or is interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!(
		business = %config.business.name,
		storage = %config.storage.primary,
		"Loaded configuration"
	);

	match args.command {
		Some(Command::Migrate { from, to }) => run_migration(&config, &from, &to).await,
		None => run_service(config).await,
	}
}

/// Runs the API server with the background timers until Ctrl-C.
async fn run_service(config: Config) -> Result<(), Box<dyn std::error::Error>> {
	let api_config = config.api.clone();
	let engine = factory_registry::build_engine_from_config(config)?;
	engine.initialize().await?;

	let tasks = engine.spawn_background_tasks();
	let engine = Arc::new(engine);

	tracing::info!("Started order service");

	let result = server::start_server(api_config, Arc::clone(&engine), shutdown_signal()).await;

	engine.shutdown(Some(tasks)).await?;
	tracing::info!("Stopped order service");
	result
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
		std::future::pending::<()>().await;
	}
	tracing::info!("Shutdown signal received");
}

async fn run_migration(
	config: &Config,
	from: &str,
	to: &str,
) -> Result<(), Box<dyn std::error::Error>> {
	if from == to {
		return Err(format!("Source and target storage are both '{}'", from).into());
	}

	let source = factory_registry::build_storage_from_config(config, from)?;
	let target = factory_registry::build_storage_from_config(config, to)?;

	tracing::info!(from = %from, to = %to, "Starting migration");
	let report = ecospin_core::migrate(&source, &target).await?;

	if report.skipped {
		tracing::warn!("Migration skipped, target already holds orders");
	} else {
		tracing::info!(
			migrated = report.migrated,
			failed = report.failed,
			counter = report.counter,
			backups = report.backups.len(),
			"Migration finished"
		);
	}
	Ok(())
}
