//! Core types for the confd configuration database: keys, values, schemas,
//! locale chains, and the shared error taxonomy.

#![warn(missing_docs)]

/// Error taxonomy shared by every confd crate.
pub mod error;
/// Key syntax validation, escaping, and hierarchy helpers.
pub mod key;
/// Locale fallback chains.
pub mod locale;
/// Schema metadata attached to keys.
pub mod schema;
/// Tagged-union configuration values and their string codec.
pub mod value;

pub use error::{Error, ErrorKind, Result};
pub use locale::LocaleList;
pub use schema::Schema;
pub use value::{Pair, Value, ValueList, ValueType};
