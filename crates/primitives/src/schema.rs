//! Schema metadata describing a key's expected value and its default.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{Value, ValueType};

/// Describes the value expected under a key.
///
/// Keys reference schemas by the key the schema is stored under. When a key
/// has no value in any layer, its schema's `default_value` stands in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
	/// Kind of the described value.
	pub value_type: ValueType,
	/// Element kind when `value_type` is a list.
	pub list_type: ValueType,
	/// First-half kind when `value_type` is a pair.
	pub car_type: ValueType,
	/// Second-half kind when `value_type` is a pair.
	pub cdr_type: ValueType,
	/// Locale of the descriptions, if localized.
	pub locale: Option<String>,
	/// Application that owns the key.
	pub owner: Option<String>,
	/// One-line description.
	pub short_desc: Option<String>,
	/// Full description.
	pub long_desc: Option<String>,
	/// Value used when the key is unset.
	pub default_value: Option<Value>,
}

impl Schema {
	/// Creates a schema for a value of `value_type` with no default.
	pub fn new(value_type: ValueType) -> Self {
		Self {
			value_type,
			..Self::default()
		}
	}

	/// Sets the default value and derives the sub-kinds from it.
	#[must_use]
	pub fn with_default(mut self, value: Value) -> Self {
		self.value_type = value.value_type();
		match &value {
			Value::List(list) => self.list_type = list.element_type(),
			Value::Pair(pair) => {
				self.car_type = pair.car().value_type();
				self.cdr_type = pair.cdr().value_type();
			}
			_ => {}
		}
		self.default_value = Some(value);
		self
	}

	/// Sets the description locale.
	#[must_use]
	pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
		self.locale = Some(locale.into());
		self
	}

	/// Sets the short and long descriptions.
	#[must_use]
	pub fn with_descriptions(
		mut self,
		short_desc: impl Into<String>,
		long_desc: impl Into<String>,
	) -> Self {
		self.short_desc = Some(short_desc.into());
		self.long_desc = Some(long_desc.into());
		self
	}

	/// Sets the owning application.
	#[must_use]
	pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
		self.owner = Some(owner.into());
		self
	}

	/// Checks that the default value matches the declared kinds.
	pub fn validate(&self) -> Result<()> {
		let Some(default) = &self.default_value else {
			return Ok(());
		};
		default.validate()?;

		if self.value_type != ValueType::Invalid && default.value_type() != self.value_type {
			return Err(Error::type_mismatch(self.value_type, default.value_type()));
		}
		match default {
			Value::List(list)
				if self.list_type != ValueType::Invalid
					&& list.element_type() != self.list_type =>
			{
				Err(Error::type_mismatch(
					format!("list of {}", self.list_type),
					format!("list of {}", list.element_type()),
				))
			}
			Value::Pair(pair)
				if (self.car_type != ValueType::Invalid
					&& pair.car().value_type() != self.car_type)
					|| (self.cdr_type != ValueType::Invalid
						&& pair.cdr().value_type() != self.cdr_type) =>
			{
				Err(Error::type_mismatch(
					format!("pair of ({}, {})", self.car_type, self.cdr_type),
					format!(
						"pair of ({}, {})",
						pair.car().value_type(),
						pair.cdr().value_type()
					),
				))
			}
			_ => Ok(()),
		}
	}
}
