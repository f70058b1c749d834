//! Error types shared by the value model, the source stack, and the daemon.

use thiserror::Error;

use crate::value::ValueType;

/// Coarse classification of an [`Error`], stable across transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Malformed key or directory syntax.
	BadKey,
	/// Source address could not be resolved.
	BadAddress,
	/// Getter/setter kind mismatch or list heterogeneity.
	TypeMismatch,
	/// Malformed encoded value or malformed backend data.
	ParseError,
	/// Backend detected structurally invalid stored data.
	Corrupt,
	/// Mutation attempted with no writable layer.
	NoWritableDatabase,
	/// Writability or ownership denied at a layer.
	NoPermission,
	/// Backend-level locking failure.
	LockFailed,
	/// Catch-all failure.
	Failed,
	/// Request received after shutdown began.
	InShutdown,
}

impl ErrorKind {
	/// Stable lowercase name for logs and wire encodings.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BadKey => "bad-key",
			Self::BadAddress => "bad-address",
			Self::TypeMismatch => "type-mismatch",
			Self::ParseError => "parse-error",
			Self::Corrupt => "corrupt",
			Self::NoWritableDatabase => "no-writable-database",
			Self::NoPermission => "no-permission",
			Self::LockFailed => "lock-failed",
			Self::Failed => "failed",
			Self::InShutdown => "in-shutdown",
		}
	}
}

impl std::fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Errors reported by configuration database operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	/// Key or directory failed syntax validation.
	#[error("\"{key}\": {reason}")]
	BadKey {
		/// The rejected key.
		key: String,
		/// Human-readable reason.
		reason: String,
	},

	/// Source address could not be parsed or no backend handles it.
	#[error("bad address `{address}`: {reason}")]
	BadAddress {
		/// The rejected address.
		address: String,
		/// Human-readable reason.
		reason: String,
	},

	/// A typed accessor was used on a value of another kind.
	#[error("expected {expected}, got {actual}")]
	TypeMismatch {
		/// Kind the caller asked for.
		expected: String,
		/// Kind actually held.
		actual: String,
	},

	/// A list element does not match the list's declared element type.
	#[error("list element {index}: expected {expected}, got {actual}")]
	ListElement {
		/// Zero-based position of the offending element.
		index: usize,
		/// Declared element type of the list.
		expected: ValueType,
		/// Type of the offending element.
		actual: ValueType,
	},

	/// Encoded value or backend payload could not be parsed.
	#[error("parse error: {0}")]
	Parse(String),

	/// Stored data is structurally invalid.
	#[error("corrupt data: {0}")]
	Corrupt(String),

	/// No layer in the stack accepts writes.
	#[error("no writable source for `{0}`")]
	NoWritableDatabase(String),

	/// A layer refused the operation.
	#[error("permission denied: {0}")]
	NoPermission(String),

	/// A backend could not take its lock.
	#[error("lock failed: {0}")]
	LockFailed(String),

	/// Any other failure.
	#[error("{0}")]
	Failed(String),

	/// The daemon is shutting down and refuses new requests.
	#[error("configuration server is shutting down")]
	InShutdown,
}

impl Error {
	/// Builds a [`Error::BadKey`].
	pub fn bad_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::BadKey {
			key: key.into(),
			reason: reason.into(),
		}
	}

	/// Builds a [`Error::BadAddress`].
	pub fn bad_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::BadAddress {
			address: address.into(),
			reason: reason.into(),
		}
	}

	/// Builds a [`Error::TypeMismatch`] from two displayable kinds.
	pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
		Self::TypeMismatch {
			expected: expected.to_string(),
			actual: actual.to_string(),
		}
	}

	/// Returns the taxonomy bucket of this error.
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::BadKey { .. } => ErrorKind::BadKey,
			Self::BadAddress { .. } => ErrorKind::BadAddress,
			Self::TypeMismatch { .. } | Self::ListElement { .. } => ErrorKind::TypeMismatch,
			Self::Parse(_) => ErrorKind::ParseError,
			Self::Corrupt(_) => ErrorKind::Corrupt,
			Self::NoWritableDatabase(_) => ErrorKind::NoWritableDatabase,
			Self::NoPermission(_) => ErrorKind::NoPermission,
			Self::LockFailed(_) => ErrorKind::LockFailed,
			Self::Failed(_) => ErrorKind::Failed,
			Self::InShutdown => ErrorKind::InShutdown,
		}
	}
}

/// Result type for configuration database operations.
pub type Result<T> = std::result::Result<T, Error>;
