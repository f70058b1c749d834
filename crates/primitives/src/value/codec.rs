//! Flat string encoding of values.
//!
//! Each encoding starts with the kind code. Scalars follow directly
//! (`i42`, `f0.5`, `bt`, `shello`). Lists and pairs carry their members as
//! quoted nested encodings separated by commas (`li"i1","i2"`,
//! `p"sname","i3"`). Schemas carry nine fields: four kind codes, four
//! optional strings, and an optional nested default, with `-` marking an
//! absent field.

use super::{Pair, Value, ValueList, ValueType};
use crate::error::{Error, Result};
use crate::schema::Schema;

pub(super) fn encode(value: &Value) -> String {
	let mut out = String::new();
	write_value(&mut out, value);
	out
}

fn write_value(out: &mut String, value: &Value) {
	out.push(value.value_type().code());
	match value {
		Value::Int(v) => out.push_str(&v.to_string()),
		Value::Float(v) => out.push_str(&v.to_string()),
		Value::Bool(v) => out.push(if *v { 't' } else { 'f' }),
		Value::String(s) => out.push_str(s),
		Value::List(list) => {
			out.push(list.element_type().code());
			for (i, item) in list.iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				write_quoted(out, &encode(item));
			}
		}
		Value::Pair(pair) => {
			write_quoted(out, &encode(pair.car()));
			out.push(',');
			write_quoted(out, &encode(pair.cdr()));
		}
		Value::Schema(schema) => {
			let kinds = [
				schema.value_type,
				schema.list_type,
				schema.car_type,
				schema.cdr_type,
			];
			for (i, kind) in kinds.into_iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				write_quoted(out, &kind.code().to_string());
			}
			for field in [
				&schema.locale,
				&schema.owner,
				&schema.short_desc,
				&schema.long_desc,
			] {
				out.push(',');
				write_optional(out, field.as_deref());
			}
			out.push(',');
			write_optional(out, schema.default_value.as_ref().map(encode).as_deref());
		}
	}
}

fn write_optional(out: &mut String, field: Option<&str>) {
	match field {
		Some(text) => write_quoted(out, text),
		None => out.push('-'),
	}
}

fn write_quoted(out: &mut String, text: &str) {
	out.push('"');
	for ch in text.chars() {
		if ch == '"' || ch == '\\' {
			out.push('\\');
		}
		out.push(ch);
	}
	out.push('"');
}

pub(super) fn decode(encoded: &str) -> Result<Value> {
	let mut chars = encoded.chars();
	let code = chars
		.next()
		.ok_or_else(|| Error::Parse("empty encoded value".into()))?;
	let ty = ValueType::from_code(code)
		.ok_or_else(|| Error::Parse(format!("unknown value type code `{code}`")))?;
	let body = chars.as_str();

	match ty {
		ValueType::Int => body
			.parse()
			.map(Value::Int)
			.map_err(|_| Error::Parse(format!("didn't understand `{body}` (expected integer)"))),
		ValueType::Float => body
			.parse()
			.map(Value::Float)
			.map_err(|_| Error::Parse(format!("didn't understand `{body}` (expected real number)"))),
		ValueType::Bool => match body {
			"t" => Ok(Value::Bool(true)),
			"f" => Ok(Value::Bool(false)),
			_ => Err(Error::Parse(format!("didn't understand `{body}` (expected true or false)"))),
		},
		ValueType::String => Ok(Value::String(body.to_owned())),
		ValueType::List => decode_list(body),
		ValueType::Pair => decode_pair(body),
		ValueType::Schema => decode_schema(body),
		ValueType::Invalid => Err(Error::Parse("encoded value has invalid type".into())),
	}
}

fn decode_list(body: &str) -> Result<Value> {
	let mut chars = body.chars();
	let code = chars
		.next()
		.ok_or_else(|| Error::Parse("list is missing its element type".into()))?;
	let element_type = ValueType::from_code(code)
		.ok_or_else(|| Error::Parse(format!("unknown list element type `{code}`")))?;

	let mut fields = Fields::new(chars.as_str());
	let mut list = ValueList::new(element_type)?;
	while !fields.is_done() {
		let item = fields.quoted()?;
		list.push(decode(&item)?)?;
	}
	Ok(Value::List(list))
}

fn decode_pair(body: &str) -> Result<Value> {
	let mut fields = Fields::new(body);
	let car = decode(&fields.quoted()?)?;
	let cdr = decode(&fields.quoted()?)?;
	fields.finish()?;
	Ok(Value::Pair(Box::new(Pair::new(car, cdr)?)))
}

fn decode_schema(body: &str) -> Result<Value> {
	let mut fields = Fields::new(body);
	let mut kind = || -> Result<ValueType> {
		let text = fields.quoted()?;
		let mut chars = text.chars();
		match (chars.next().and_then(ValueType::from_code), chars.next()) {
			(Some(ty), None) => Ok(ty),
			_ => Err(Error::Parse(format!("bad schema type code `{text}`"))),
		}
	};
	let value_type = kind()?;
	let list_type = kind()?;
	let car_type = kind()?;
	let cdr_type = kind()?;

	let schema = Schema {
		value_type,
		list_type,
		car_type,
		cdr_type,
		locale: fields.optional()?,
		owner: fields.optional()?,
		short_desc: fields.optional()?,
		long_desc: fields.optional()?,
		default_value: fields.optional()?.map(|s| decode(&s)).transpose()?,
	};
	fields.finish()?;
	schema.validate()?;
	Ok(Value::Schema(Box::new(schema)))
}

/// Cursor over a comma-separated field list.
struct Fields<'a> {
	rest: &'a str,
	first: bool,
}

impl<'a> Fields<'a> {
	fn new(rest: &'a str) -> Self {
		Self { rest, first: true }
	}

	fn is_done(&self) -> bool {
		self.rest.is_empty()
	}

	fn separator(&mut self) -> Result<()> {
		if self.first {
			self.first = false;
			return Ok(());
		}
		self.rest = self
			.rest
			.strip_prefix(',')
			.ok_or_else(|| Error::Parse(format!("expected `,` before `{}`", self.rest)))?;
		Ok(())
	}

	fn quoted(&mut self) -> Result<String> {
		self.separator()?;
		let body = self
			.rest
			.strip_prefix('"')
			.ok_or_else(|| Error::Parse(format!("expected quoted field at `{}`", self.rest)))?;

		let mut out = String::new();
		let mut escaped = false;
		for (idx, ch) in body.char_indices() {
			match (escaped, ch) {
				(true, _) => {
					out.push(ch);
					escaped = false;
				}
				(false, '\\') => escaped = true,
				(false, '"') => {
					self.rest = &body[idx + 1..];
					return Ok(out);
				}
				(false, _) => out.push(ch),
			}
		}
		Err(Error::Parse("unterminated quoted field".into()))
	}

	fn optional(&mut self) -> Result<Option<String>> {
		if !self.first
			&& let Some(rest) = self.rest.strip_prefix(",-")
			&& (rest.is_empty() || rest.starts_with(','))
		{
			self.rest = rest;
			return Ok(None);
		}
		self.quoted().map(Some)
	}

	fn finish(&self) -> Result<()> {
		if self.rest.is_empty() {
			Ok(())
		} else {
			Err(Error::Parse(format!("trailing data `{}`", self.rest)))
		}
	}
}
