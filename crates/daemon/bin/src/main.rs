//! confd daemon binary.
//!
//! Serves the default configuration database plus databases opened by
//! address, flushing every one of them on SIGINT, SIGTERM or SIGHUP.

use std::path::PathBuf;

use clap::Parser;
use confd_daemon::source_path::Variables;
use confd_daemon::{Daemon, DaemonConfig};
use confd_store::BackendRegistry;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::signals::ShutdownSignals;

mod signals;

/// Daemon command line arguments.
#[derive(Parser, Debug)]
#[command(name = "confd")]
#[command(about = "Layered configuration database daemon")]
struct Args {
	/// Configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Address of a default database layer, highest priority first
	#[arg(short, long = "address", value_name = "ADDRESS")]
	addresses: Vec<String>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	info!("starting confd");

	let mut config = match args.config.or_else(confd_daemon::config::default_config_path) {
		Some(path) => {
			info!(path = %path.display(), "loading configuration");
			DaemonConfig::load_or_default(&path)?
		}
		None => DaemonConfig::default(),
	};
	if !args.addresses.is_empty() {
		let mut addresses = args.addresses;
		addresses.append(&mut config.addresses);
		config.addresses = addresses;
	}

	let daemon = Daemon::new(config, BackendRegistry::with_builtin(), &Variables::from_process());

	let shutdown = CancellationToken::new();
	let mut signals = ShutdownSignals::install()?;
	let on_signal = shutdown.clone();
	tokio::spawn(async move {
		let name = signals.recv().await;
		info!(signal = name, "shutdown signal received");
		on_signal.cancel();
	});

	daemon.run(shutdown).await?;
	info!("confd stopped");

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	// CONFD_LOG_DIR redirects logs to a per-process file
	if let Some(log_dir) = std::env::var("CONFD_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let pid = std::process::id();
		let log_path = log_dir.join(format!("confd.{pid}.log"));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("confd=trace,confd_daemon=trace,confd_store=trace,debug")
				} else {
					EnvFilter::new("confd=debug,confd_daemon=debug,confd_store=debug,info")
				}
			});

			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry()
				.with(filter)
				.with(file_layer)
				.init();

			tracing::info!(path = ?log_path, "confd tracing initialized");
			return;
		}
	}

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(if verbose { "debug" } else { "info" })
	});
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
