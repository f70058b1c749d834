use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::error::ErrorKind;

#[test]
fn new_gives_zero_payloads() {
	assert_eq!(Value::new(ValueType::Int).unwrap(), Value::Int(0));
	assert_eq!(Value::new(ValueType::String).unwrap(), Value::String(String::new()));
	assert_eq!(Value::new(ValueType::Bool).unwrap(), Value::Bool(false));
	assert!(Value::new(ValueType::List).is_err());
	assert!(Value::new(ValueType::Invalid).is_err());
}

#[test]
fn typed_setters_reject_other_kinds() {
	let mut v = Value::new(ValueType::Int).unwrap();
	v.set_int(7).unwrap();
	assert_eq!(v.as_int().unwrap(), 7);

	let err = v.set_string("nope").unwrap_err();
	assert_eq!(err.kind(), ErrorKind::TypeMismatch);
	assert_eq!(
		err,
		Error::TypeMismatch {
			expected: "string".into(),
			actual: "int".into()
		}
	);
}

#[test]
fn getter_mismatch_names_both_kinds() {
	let err = Value::from("text").as_float().unwrap_err();
	assert_eq!(err.to_string(), "expected float, got string");
}

#[test]
fn list_rejects_heterogeneous_append() {
	let mut list = ValueList::new(ValueType::Int).unwrap();
	list.push(Value::Int(1)).unwrap();
	let err = list.push(Value::from("two")).unwrap_err();
	assert_eq!(
		err,
		Error::ListElement {
			index: 1,
			expected: ValueType::Int,
			actual: ValueType::String,
		}
	);
	assert_eq!(list.len(), 1);
}

#[test]
fn lists_and_pairs_do_not_nest() {
	assert!(ValueList::new(ValueType::List).is_err());
	assert!(ValueList::new(ValueType::Pair).is_err());

	let inner = Value::list(ValueType::Int, [Value::Int(1)]).unwrap();
	assert!(Value::pair(inner, Value::Int(2)).is_err());
}

#[test]
fn set_list_keeps_element_type() {
	let mut v = Value::new_list(ValueType::String).unwrap();
	let ints = ValueList::from_values(ValueType::Int, [Value::Int(1)]).unwrap();
	assert!(v.set_list(ints).is_err());

	let strings = ValueList::from_values(ValueType::String, [Value::from("a")]).unwrap();
	v.set_list(strings).unwrap();
	assert_eq!(v.as_list().unwrap().len(), 1);
}

#[test]
fn pair_halves_keep_their_kind() {
	let mut v = Value::new_pair(ValueType::String, ValueType::Int).unwrap();
	let pair = v.as_pair_mut().unwrap();
	pair.set_car(Value::from("name")).unwrap();
	assert!(pair.set_cdr(Value::from("wrong")).is_err());
	assert_eq!(pair.car().as_str().unwrap(), "name");
}

#[test]
fn string_from_invalid_utf8_is_parse_error() {
	let err = Value::string_from_utf8(vec![0x66, 0xff, 0x66]).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::ParseError);
}

#[test]
fn validate_catches_deserialized_heterogeneous_list() {
	let forged = Value::List(ValueList {
		element_type: ValueType::Int,
		items: vec![Value::Int(1), Value::Bool(true)],
	});
	assert_eq!(
		forged.validate().unwrap_err(),
		Error::ListElement {
			index: 1,
			expected: ValueType::Int,
			actual: ValueType::Bool,
		}
	);
}

#[test]
fn schema_default_must_match_declared_type() {
	let mut schema = Schema::new(ValueType::Int);
	schema.default_value = Some(Value::from("x"));
	assert!(Value::from(schema).validate().is_err());
}

#[test]
fn encode_decode_known_shapes() {
	let cases = [
		Value::Int(-42),
		Value::Float(2.5),
		Value::Bool(true),
		Value::from("with \"quotes\", commas and \\ slashes"),
		Value::list(ValueType::Int, [Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap(),
		Value::list(ValueType::String, [Value::from("a"), Value::from("b,\"c\"")]).unwrap(),
		Value::new_list(ValueType::Bool).unwrap(),
		Value::pair(Value::from("name"), Value::Int(3)).unwrap(),
		Value::from(
			Schema::new(ValueType::Pair)
				.with_default(Value::pair(Value::from("x"), Value::Float(1.5)).unwrap())
				.with_locale("en")
				.with_owner("editor")
				.with_descriptions("Short", "Long, with \"quotes\""),
		),
	];
	for value in cases {
		let encoded = value.encode();
		assert_eq!(Value::decode(&encoded).unwrap(), value, "encoded as {encoded}");
	}
}

#[test]
fn encoding_is_flat_text() {
	assert_eq!(Value::Int(42).encode(), "i42");
	assert_eq!(Value::Bool(false).encode(), "bf");
	assert_eq!(
		Value::list(ValueType::Int, [Value::Int(1), Value::Int(2)])
			.unwrap()
			.encode(),
		"li\"i1\",\"i2\""
	);
	assert_eq!(
		Value::pair(Value::from("a"), Value::Int(1)).unwrap().encode(),
		"p\"sa\",\"i1\""
	);
}

#[test]
fn decode_rejects_malformed_input() {
	for bad in ["", "x1", "inot", "bq", "li\"i1\"x", "p\"i1\"", "p\"i1\",\"i2\"junk", "li\"i1"] {
		let err = Value::decode(bad).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::ParseError, "input {bad:?}");
	}
}

fn primitive() -> impl Strategy<Value = Value> {
	prop_oneof![
		any::<i32>().prop_map(Value::Int),
		any::<String>().prop_map(Value::String),
		(-1.0e12f64..1.0e12).prop_map(Value::Float),
		any::<bool>().prop_map(Value::Bool),
		(any::<Option<String>>(), any::<i32>()).prop_map(|(desc, default)| {
			let mut schema = Schema::new(ValueType::Int).with_default(Value::Int(default));
			schema.short_desc = desc;
			Value::from(schema)
		}),
	]
}

fn any_value() -> impl Strategy<Value = Value> {
	prop_oneof![
		primitive(),
		proptest::collection::vec(any::<i32>(), 0..6)
			.prop_map(|v| Value::list(ValueType::Int, v.into_iter().map(Value::Int)).unwrap()),
		proptest::collection::vec(any::<String>(), 0..6)
			.prop_map(|v| Value::list(ValueType::String, v.into_iter().map(Value::String)).unwrap()),
		(primitive(), primitive()).prop_map(|(car, cdr)| Value::pair(car, cdr).unwrap()),
	]
}

proptest! {
	#[test]
	fn decode_inverts_encode(value in any_value()) {
		prop_assert_eq!(Value::decode(&value.encode()).unwrap(), value);
	}
}
