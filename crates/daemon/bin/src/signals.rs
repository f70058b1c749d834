//! Signals that stop the daemon cleanly.
//!
//! SIGINT, SIGTERM and SIGHUP all cancel the shutdown token so every
//! database is flushed before the process exits.

use std::io;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Installed handlers for the shutdown signals.
#[cfg(unix)]
pub(crate) struct ShutdownSignals {
	interrupt: Signal,
	terminate: Signal,
	hangup: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
	/// Must be called inside a runtime. Replaces the default action of each
	/// signal for the rest of the process.
	pub(crate) fn install() -> io::Result<Self> {
		Ok(Self {
			interrupt: signal(SignalKind::interrupt())?,
			terminate: signal(SignalKind::terminate())?,
			hangup: signal(SignalKind::hangup())?,
		})
	}

	/// Waits for the next shutdown signal and returns its name.
	pub(crate) async fn recv(&mut self) -> &'static str {
		tokio::select! {
			_ = self.interrupt.recv() => "SIGINT",
			_ = self.terminate.recv() => "SIGTERM",
			_ = self.hangup.recv() => "SIGHUP",
		}
	}
}

#[cfg(not(unix))]
pub(crate) struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
	pub(crate) fn install() -> io::Result<Self> {
		Ok(Self)
	}

	pub(crate) async fn recv(&mut self) -> &'static str {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!(%err, "failed to listen for ctrl-c");
			std::future::pending::<()>().await;
		}
		"ctrl-c"
	}
}
