//! The confd daemon: process context, configuration, and source path files.
//!
//! [`Daemon`] owns every database in the process and runs the periodic
//! maintenance sweep. The `confd` binary wires it to the command line, a
//! TOML configuration file, and the termination signals.

#![warn(missing_docs)]

pub mod config;
mod daemon;
pub mod source_path;

pub use config::{ConfigError, DaemonConfig};
pub use daemon::Daemon;
