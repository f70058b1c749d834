//! Key syntax and hierarchy helpers.
//!
//! Keys are slash-delimited absolute paths such as `/apps/editor/font`. The
//! root `/` is a valid directory. Keys are restricted to ASCII and exclude
//! characters that are awkward for file-backed stores, shells, or format
//! strings. [`escape`] maps arbitrary bytes into a single valid key segment
//! and [`unescape`] reverses it.

use crate::error::{Error, Result};

/// Characters rejected anywhere in a key.
const INVALID_CHARS: &[u8] = b" \t\r\n\"$&<>,+=#!()'|{}[]?~`;%\\";

/// The root directory key.
pub const ROOT: &str = "/";

/// Checks `key` against the key grammar.
///
/// Returns [`Error::BadKey`] naming the first violation.
pub fn validate_key(key: &str) -> Result<()> {
	check(key).map_err(|reason| Error::bad_key(key, reason))
}

/// Checks a directory name. Directories follow the key grammar exactly.
pub fn validate_dir(dir: &str) -> Result<()> {
	validate_key(dir)
}

/// Returns `true` if `key` passes [`validate_key`].
pub fn is_valid(key: &str) -> bool {
	check(key).is_ok()
}

fn check(key: &str) -> std::result::Result<(), String> {
	let bytes = key.as_bytes();
	if bytes.first() != Some(&b'/') {
		return Err("Must begin with a slash (/)".into());
	}
	if bytes.len() == 1 {
		return Ok(());
	}

	let mut just_saw_slash = false;
	for ch in key.chars() {
		if just_saw_slash {
			match ch {
				'/' => return Err("Can't have two slashes (/) in a row".into()),
				'.' => return Err("Can't have a period (.) right after a slash (/)".into()),
				_ => {}
			}
		}

		if ch == '/' {
			just_saw_slash = true;
			continue;
		}
		just_saw_slash = false;

		if !ch.is_ascii() {
			return Err(format!(
				"'{ch}' is not an ASCII character, so isn't allowed in key names"
			));
		}
		if INVALID_CHARS.contains(&(ch as u8)) {
			return Err(format!(
				"'{}' is an invalid character in key/directory names",
				ch.escape_default()
			));
		}
	}

	if just_saw_slash {
		return Err("Key/directory may not end with a slash (/)".into());
	}
	Ok(())
}

fn needs_escape(byte: u8) -> bool {
	matches!(byte, b'/' | b'.' | b'@')
		|| !byte.is_ascii()
		|| byte.is_ascii_control()
		|| INVALID_CHARS.contains(&byte)
}

/// Escapes arbitrary bytes into a single valid key segment.
///
/// Every byte that could not appear in a segment is written as
/// `@<decimal>@`. Prefixing the result with `/` always yields a valid key.
pub fn escape(text: &[u8]) -> String {
	let mut out = String::with_capacity(text.len());
	for &byte in text {
		if needs_escape(byte) {
			out.push('@');
			out.push_str(&byte.to_string());
			out.push('@');
		} else {
			out.push(byte as char);
		}
	}
	out
}

/// Reverses [`escape`].
///
/// Malformed sequences (non-numeric, out of byte range, or unterminated)
/// are dropped rather than reported.
pub fn unescape(escaped: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(escaped.len());
	let mut seq: Option<String> = None;
	for &byte in escaped.as_bytes() {
		match (&mut seq, byte) {
			(Some(digits), b'@') => {
				if let Ok(value) = digits.parse::<u8>() {
					out.push(value);
				}
				seq = None;
			}
			(Some(digits), _) => digits.push(byte as char),
			(None, b'@') => seq = Some(String::new()),
			(None, _) => out.push(byte),
		}
	}
	out
}

/// Returns `true` if `below` is `above` itself or nested beneath it.
///
/// Only whole segments match: `/foo` is not above `/foofoo/bar`.
pub fn key_is_below(above: &str, below: &str) -> bool {
	if above == ROOT {
		return true;
	}
	match below.strip_prefix(above) {
		Some(rest) => rest.is_empty() || rest.starts_with('/'),
		None => false,
	}
}

/// Returns the parent directory of `key`, or `None` for the root.
pub fn parent(key: &str) -> Option<&str> {
	if key == ROOT {
		return None;
	}
	match key.rfind('/') {
		Some(0) => Some(ROOT),
		Some(idx) => Some(&key[..idx]),
		None => None,
	}
}

/// Returns the last segment of `key`.
pub fn basename(key: &str) -> &str {
	match key.rfind('/') {
		Some(idx) => &key[idx + 1..],
		None => key,
	}
}

/// Joins a directory and a relative segment.
pub fn join(dir: &str, name: &str) -> String {
	if dir.ends_with('/') {
		format!("{dir}{name}")
	} else {
		format!("{dir}/{name}")
	}
}

/// Iterates `key` and each of its ancestors up to and including `/`.
pub fn ancestors(key: &str) -> impl Iterator<Item = &str> {
	std::iter::successors(Some(key), |k| parent(k))
}
