//! Tagged-union configuration values.
//!
//! A [`Value`] is one of a closed set of kinds. Lists carry a declared
//! element type and only accept elements of that type; pairs hold two
//! non-list, non-pair values. Both invariants are enforced by the checked
//! constructors of [`ValueList`] and [`Pair`], and re-checked by
//! [`Value::validate`] for values that arrive through deserialization.

mod codec;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// Kind tag of a [`Value`], also used for schema sub-kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
	/// No kind; used for unset schema sub-kinds.
	#[default]
	Invalid,
	/// 32-bit signed integer.
	Int,
	/// UTF-8 string.
	String,
	/// Double-precision float.
	Float,
	/// Boolean.
	Bool,
	/// Schema description.
	Schema,
	/// Homogeneous list of primitive values.
	List,
	/// Pair of primitive values.
	Pair,
}

impl ValueType {
	/// Human-readable kind name.
	pub const fn name(self) -> &'static str {
		match self {
			Self::Invalid => "*invalid*",
			Self::Int => "int",
			Self::String => "string",
			Self::Float => "float",
			Self::Bool => "bool",
			Self::Schema => "schema",
			Self::List => "list",
			Self::Pair => "pair",
		}
	}

	/// Returns `true` for kinds allowed inside lists and pairs.
	pub const fn is_primitive(self) -> bool {
		matches!(
			self,
			Self::Int | Self::String | Self::Float | Self::Bool | Self::Schema
		)
	}

	pub(crate) const fn code(self) -> char {
		match self {
			Self::Invalid => '?',
			Self::Int => 'i',
			Self::String => 's',
			Self::Float => 'f',
			Self::Bool => 'b',
			Self::Schema => 'c',
			Self::List => 'l',
			Self::Pair => 'p',
		}
	}

	pub(crate) const fn from_code(code: char) -> Option<Self> {
		Some(match code {
			'?' => Self::Invalid,
			'i' => Self::Int,
			's' => Self::String,
			'f' => Self::Float,
			'b' => Self::Bool,
			'c' => Self::Schema,
			'l' => Self::List,
			'p' => Self::Pair,
			_ => return None,
		})
	}
}

impl std::fmt::Display for ValueType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	/// Integer payload.
	Int(i32),
	/// String payload.
	String(String),
	/// Float payload.
	Float(f64),
	/// Boolean payload.
	Bool(bool),
	/// Schema payload.
	Schema(Box<Schema>),
	/// Homogeneous list payload.
	List(ValueList),
	/// Pair payload.
	Pair(Box<Pair>),
}

/// A list of values sharing one primitive element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueList {
	element_type: ValueType,
	items: Vec<Value>,
}

/// Two primitive values, `car` and `cdr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
	car: Value,
	cdr: Value,
}

fn require_primitive(ty: ValueType) -> Result<()> {
	if ty.is_primitive() {
		Ok(())
	} else {
		Err(Error::type_mismatch("primitive type", ty))
	}
}

impl ValueList {
	/// Creates an empty list of `element_type`.
	pub fn new(element_type: ValueType) -> Result<Self> {
		require_primitive(element_type)?;
		Ok(Self {
			element_type,
			items: Vec::new(),
		})
	}

	/// Creates a list from `values`, rejecting the first element of another type.
	pub fn from_values(
		element_type: ValueType,
		values: impl IntoIterator<Item = Value>,
	) -> Result<Self> {
		let mut list = Self::new(element_type)?;
		for value in values {
			list.push(value)?;
		}
		Ok(list)
	}

	/// Appends `value` if it matches the element type.
	pub fn push(&mut self, value: Value) -> Result<()> {
		let actual = value.value_type();
		if actual != self.element_type {
			return Err(Error::ListElement {
				index: self.items.len(),
				expected: self.element_type,
				actual,
			});
		}
		self.items.push(value);
		Ok(())
	}

	/// Declared element type.
	pub const fn element_type(&self) -> ValueType {
		self.element_type
	}

	/// Elements in order.
	pub fn as_slice(&self) -> &[Value] {
		&self.items
	}

	/// Iterates the elements.
	pub fn iter(&self) -> std::slice::Iter<'_, Value> {
		self.items.iter()
	}

	/// Number of elements.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Returns `true` if the list has no elements.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Consumes the list, returning its elements.
	pub fn into_vec(self) -> Vec<Value> {
		self.items
	}

	fn validate(&self) -> Result<()> {
		require_primitive(self.element_type)?;
		for (index, item) in self.items.iter().enumerate() {
			let actual = item.value_type();
			if actual != self.element_type {
				return Err(Error::ListElement {
					index,
					expected: self.element_type,
					actual,
				});
			}
			item.validate()?;
		}
		Ok(())
	}
}

impl<'a> IntoIterator for &'a ValueList {
	type Item = &'a Value;
	type IntoIter = std::slice::Iter<'a, Value>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.iter()
	}
}

impl Pair {
	/// Creates a pair; neither half may be a list or a pair.
	pub fn new(car: Value, cdr: Value) -> Result<Self> {
		require_primitive(car.value_type())?;
		require_primitive(cdr.value_type())?;
		Ok(Self { car, cdr })
	}

	/// First half.
	pub const fn car(&self) -> &Value {
		&self.car
	}

	/// Second half.
	pub const fn cdr(&self) -> &Value {
		&self.cdr
	}

	/// Replaces the first half, keeping its kind.
	pub fn set_car(&mut self, value: Value) -> Result<()> {
		replace_same_kind(&mut self.car, value)
	}

	/// Replaces the second half, keeping its kind.
	pub fn set_cdr(&mut self, value: Value) -> Result<()> {
		replace_same_kind(&mut self.cdr, value)
	}

	fn validate(&self) -> Result<()> {
		require_primitive(self.car.value_type())?;
		require_primitive(self.cdr.value_type())?;
		self.car.validate()?;
		self.cdr.validate()
	}
}

fn replace_same_kind(slot: &mut Value, value: Value) -> Result<()> {
	if slot.value_type() != value.value_type() {
		return Err(Error::type_mismatch(slot.value_type(), value.value_type()));
	}
	*slot = value;
	Ok(())
}

macro_rules! typed_accessors {
	($($get:ident, $set:ident, $variant:ident, $ty:ty;)*) => {
		$(
			#[doc = concat!("Returns the payload, or a type mismatch if this is not a `", stringify!($variant), "`.")]
			pub fn $get(&self) -> Result<$ty> {
				match self {
					Self::$variant(v) => Ok(*v),
					other => Err(Error::type_mismatch(ValueType::$variant, other.value_type())),
				}
			}

			#[doc = concat!("Assigns the payload of a `", stringify!($variant), "` value.")]
			pub fn $set(&mut self, value: $ty) -> Result<()> {
				match self {
					Self::$variant(v) => {
						*v = value;
						Ok(())
					}
					other => Err(Error::type_mismatch(ValueType::$variant, other.value_type())),
				}
			}
		)*
	};
}

impl Value {
	/// Creates a value of a primitive kind with a zero payload.
	///
	/// Lists and pairs need their sub-kinds; use [`Value::new_list`] and
	/// [`Value::new_pair`].
	pub fn new(ty: ValueType) -> Result<Self> {
		Ok(match ty {
			ValueType::Int => Self::Int(0),
			ValueType::String => Self::String(String::new()),
			ValueType::Float => Self::Float(0.0),
			ValueType::Bool => Self::Bool(false),
			ValueType::Schema => Self::Schema(Box::default()),
			ValueType::Invalid | ValueType::List | ValueType::Pair => {
				return Err(Error::type_mismatch("primitive type", ty));
			}
		})
	}

	/// Creates an empty list of `element_type`.
	pub fn new_list(element_type: ValueType) -> Result<Self> {
		ValueList::new(element_type).map(Self::List)
	}

	/// Creates a pair with zero payloads of the given kinds.
	pub fn new_pair(car: ValueType, cdr: ValueType) -> Result<Self> {
		Pair::new(Self::new(car)?, Self::new(cdr)?).map(|p| Self::Pair(Box::new(p)))
	}

	/// Builds a string value from raw bytes, rejecting invalid UTF-8.
	pub fn string_from_utf8(bytes: Vec<u8>) -> Result<Self> {
		String::from_utf8(bytes)
			.map(Self::String)
			.map_err(|err| Error::Parse(format!("text contains invalid UTF-8: {err}")))
	}

	/// Builds a list value in one step.
	pub fn list(element_type: ValueType, values: impl IntoIterator<Item = Value>) -> Result<Self> {
		ValueList::from_values(element_type, values).map(Self::List)
	}

	/// Builds a pair value in one step.
	pub fn pair(car: Value, cdr: Value) -> Result<Self> {
		Pair::new(car, cdr).map(|p| Self::Pair(Box::new(p)))
	}

	/// Kind tag of this value.
	pub const fn value_type(&self) -> ValueType {
		match self {
			Self::Int(_) => ValueType::Int,
			Self::String(_) => ValueType::String,
			Self::Float(_) => ValueType::Float,
			Self::Bool(_) => ValueType::Bool,
			Self::Schema(_) => ValueType::Schema,
			Self::List(_) => ValueType::List,
			Self::Pair(_) => ValueType::Pair,
		}
	}

	typed_accessors! {
		as_int, set_int, Int, i32;
		as_float, set_float, Float, f64;
		as_bool, set_bool, Bool, bool;
	}

	/// Returns the string payload.
	pub fn as_str(&self) -> Result<&str> {
		match self {
			Self::String(s) => Ok(s),
			other => Err(Error::type_mismatch(ValueType::String, other.value_type())),
		}
	}

	/// Assigns the string payload.
	pub fn set_string(&mut self, value: impl Into<String>) -> Result<()> {
		match self {
			Self::String(s) => {
				*s = value.into();
				Ok(())
			}
			other => Err(Error::type_mismatch(ValueType::String, other.value_type())),
		}
	}

	/// Returns the schema payload.
	pub fn as_schema(&self) -> Result<&Schema> {
		match self {
			Self::Schema(s) => Ok(s),
			other => Err(Error::type_mismatch(ValueType::Schema, other.value_type())),
		}
	}

	/// Assigns the schema payload.
	pub fn set_schema(&mut self, schema: Schema) -> Result<()> {
		match self {
			Self::Schema(s) => {
				**s = schema;
				Ok(())
			}
			other => Err(Error::type_mismatch(ValueType::Schema, other.value_type())),
		}
	}

	/// Returns the list payload.
	pub fn as_list(&self) -> Result<&ValueList> {
		match self {
			Self::List(l) => Ok(l),
			other => Err(Error::type_mismatch(ValueType::List, other.value_type())),
		}
	}

	/// Replaces the list payload; the element type must not change.
	pub fn set_list(&mut self, list: ValueList) -> Result<()> {
		match self {
			Self::List(l) if l.element_type == list.element_type => {
				*l = list;
				Ok(())
			}
			Self::List(l) => Err(Error::type_mismatch(
				format!("list of {}", l.element_type),
				format!("list of {}", list.element_type),
			)),
			other => Err(Error::type_mismatch(ValueType::List, other.value_type())),
		}
	}

	/// Returns the pair payload.
	pub fn as_pair(&self) -> Result<&Pair> {
		match self {
			Self::Pair(p) => Ok(p),
			other => Err(Error::type_mismatch(ValueType::Pair, other.value_type())),
		}
	}

	/// Returns the pair payload mutably, for [`Pair::set_car`] and [`Pair::set_cdr`].
	pub fn as_pair_mut(&mut self) -> Result<&mut Pair> {
		match self {
			Self::Pair(p) => Ok(p),
			other => Err(Error::type_mismatch(ValueType::Pair, other.value_type())),
		}
	}

	/// Re-checks list homogeneity, pair nesting, and schema defaults.
	pub fn validate(&self) -> Result<()> {
		match self {
			Self::Int(_) | Self::String(_) | Self::Float(_) | Self::Bool(_) => Ok(()),
			Self::Schema(schema) => schema.validate(),
			Self::List(list) => list.validate(),
			Self::Pair(pair) => pair.validate(),
		}
	}

	/// Encodes the value as a flat self-describing string.
	pub fn encode(&self) -> String {
		codec::encode(self)
	}

	/// Parses a string produced by [`Value::encode`].
	pub fn decode(encoded: &str) -> Result<Self> {
		codec::decode(encoded)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Self::Int(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Self::Float(v)
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Self::Bool(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Self::String(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Self::String(v)
	}
}

impl From<Schema> for Value {
	fn from(v: Schema) -> Self {
		Self::Schema(Box::new(v))
	}
}

#[cfg(test)]
mod tests;
