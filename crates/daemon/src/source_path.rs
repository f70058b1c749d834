//! Source path files.
//!
//! A source path file lists one address per line, highest priority first.
//! Blank lines and lines starting with `#` are ignored. A line of the form
//! `include <path>` splices in another file; relative paths resolve against
//! the including file. `$(HOME)`, `$(USER)` and `$(ENV_<NAME>)` are expanded
//! in addresses and include paths alike.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, DaemonConfig, Result};

/// Address used when nothing else is configured.
pub const FALLBACK_ADDRESS: &str = "memory:readwrite:$(HOME)/.confd";

/// Values substituted into source path lines.
#[derive(Debug, Clone, Default)]
pub struct Variables {
	/// Value of `$(HOME)`.
	pub home: Option<String>,
	/// Value of `$(USER)`.
	pub user: Option<String>,
	/// Values of `$(ENV_<NAME>)`, keyed by `<NAME>`.
	pub env: HashMap<String, String>,
}

impl Variables {
	/// Captures the current process environment.
	pub fn from_process() -> Self {
		let env: HashMap<String, String> = std::env::vars().collect();
		Self {
			home: dirs::home_dir().map(|p| p.display().to_string()),
			user: env.get("USER").or_else(|| env.get("LOGNAME")).cloned(),
			env,
		}
	}

	fn lookup(&self, name: &str) -> Option<&str> {
		match name {
			"HOME" => self.home.as_deref(),
			"USER" => self.user.as_deref(),
			_ => name
				.strip_prefix("ENV_")
				.and_then(|var| self.env.get(var))
				.map(String::as_str),
		}
	}

	/// Substitutes every `$(NAME)` in `text`.
	///
	/// Unknown variables expand to nothing. An unterminated `$(` is kept
	/// verbatim.
	pub fn expand(&self, text: &str) -> String {
		let mut out = String::with_capacity(text.len());
		let mut rest = text;
		while let Some(start) = rest.find("$(") {
			out.push_str(&rest[..start]);
			let after = &rest[start + 2..];
			let Some(end) = after.find(')') else {
				out.push_str(&rest[start..]);
				return out;
			};
			let name = &after[..end];
			match self.lookup(name) {
				Some(value) => out.push_str(value),
				None => tracing::warn!(variable = name, "unknown variable in source path"),
			}
			rest = &after[end + 1..];
		}
		out.push_str(rest);
		out
	}
}

/// Reads the addresses listed in `path`, following includes.
///
/// A missing top-level file is an error; a missing included file is logged
/// and skipped.
pub fn read_addresses(path: &Path, vars: &Variables) -> Result<Vec<String>> {
	let mut addresses = Vec::new();
	let mut visiting = Vec::new();
	read_into(path, vars, &mut visiting, &mut addresses)?;
	Ok(addresses)
}

fn read_into(
	path: &Path,
	vars: &Variables,
	visiting: &mut Vec<PathBuf>,
	out: &mut Vec<String>,
) -> Result<()> {
	let identity = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
	if visiting.contains(&identity) {
		return Err(ConfigError::IncludeCycle(path.to_path_buf()));
	}
	let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
		path: path.to_path_buf(),
		error,
	})?;
	visiting.push(identity);

	for line in text.lines().map(str::trim) {
		if line.is_empty() || line.starts_with('#') {
			continue;
		}
		if let Some(target) = include_target(line) {
			let target = PathBuf::from(vars.expand(target));
			let target = match path.parent() {
				Some(base) if target.is_relative() => base.join(target),
				_ => target,
			};
			match read_into(&target, vars, visiting, out) {
				Err(ConfigError::Io { path, error }) => {
					tracing::warn!(path = %path.display(), %error, "skipping unreadable include");
				}
				other => other?,
			}
			continue;
		}
		out.push(vars.expand(line));
	}

	visiting.pop();
	Ok(())
}

fn include_target(line: &str) -> Option<&str> {
	let rest = line.strip_prefix("include")?;
	if !rest.starts_with(char::is_whitespace) {
		return None;
	}
	let target = rest.trim();
	(!target.is_empty()).then_some(target)
}

/// Addresses of the default database: configured addresses first, then the
/// path file, then [`FALLBACK_ADDRESS`] if both are empty.
pub fn default_addresses(config: &DaemonConfig, vars: &Variables) -> Vec<String> {
	let mut addresses: Vec<String> = config.addresses.iter().map(|a| vars.expand(a)).collect();

	if let Some(path_file) = &config.path_file {
		match read_addresses(path_file, vars) {
			Ok(found) => addresses.extend(found),
			Err(err) => tracing::error!(%err, "failed to read source path file"),
		}
	}

	if addresses.is_empty() {
		let fallback = vars.expand(FALLBACK_ADDRESS);
		tracing::info!(address = %fallback, "no addresses configured, using fallback");
		addresses.push(fallback);
	}
	addresses
}
