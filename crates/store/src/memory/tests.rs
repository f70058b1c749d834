use confd_primitives::{ErrorKind, LocaleList, Schema, ValueType};
use pretty_assertions::assert_eq;

use super::*;
use crate::testing::open;

fn value_of(source: &dyn Source, key: &str) -> Option<Value> {
	source.query_value(key, &[]).unwrap().value
}

#[test]
fn writes_stay_private_until_sync() {
	let backend = MemoryBackend::new();
	let mut writer = open(&backend, "memory:readwrite:user");
	writer.set_value("/apps/x", &Value::Int(1)).unwrap();

	let reader = open(&backend, "memory:readonly:user");
	assert_eq!(value_of(&*reader, "/apps/x"), None);

	writer.sync_all().unwrap();
	let reader = open(&backend, "memory:readonly:user");
	assert_eq!(value_of(&*reader, "/apps/x"), Some(Value::Int(1)));
	assert_eq!(backend.resources(), vec!["user".to_owned()]);
}

#[test]
fn clear_cache_reloads_only_when_clean() {
	let backend = MemoryBackend::new();
	let mut writer = open(&backend, "memory:user");
	let mut other = open(&backend, "memory:user");

	writer.set_value("/k", &Value::from("committed")).unwrap();
	writer.sync_all().unwrap();

	other.clear_cache();
	assert_eq!(value_of(&*other, "/k"), Some(Value::from("committed")));

	other.set_value("/k", &Value::from("local")).unwrap();
	other.clear_cache();
	assert_eq!(value_of(&*other, "/k"), Some(Value::from("local")));
}

#[test]
fn read_only_source_refuses_mutation() {
	let backend = MemoryBackend::new();
	let mut source = open(&backend, "memory:readonly:sys");
	assert!(!source.is_writable());
	for err in [
		source.set_value("/a", &Value::Int(1)).unwrap_err(),
		source.unset_value("/a", None).unwrap_err(),
		source.set_schema("/a", Some("/schemas/a")).unwrap_err(),
		source.remove_dir("/a").unwrap_err(),
	] {
		assert_eq!(err.kind(), ErrorKind::NoPermission);
	}
}

#[test]
fn listing_returns_immediate_children() {
	let backend = MemoryBackend::new();
	let mut source = open(&backend, "memory:db");
	for key in ["/a/x", "/a/y", "/a/b/deep", "/a/b/c/deeper", "/a.b", "/ab/z"] {
		source.set_value(key, &Value::Bool(true)).unwrap();
	}

	let names: Vec<_> = source
		.all_entries("/a", &[])
		.unwrap()
		.into_iter()
		.map(|(name, _)| name)
		.collect();
	assert_eq!(names, vec!["x", "y"]);
	assert_eq!(source.all_subdirs("/a").unwrap(), vec!["b"]);
	assert_eq!(source.all_subdirs("/").unwrap(), vec!["a", "ab"]);
	assert!(source.dir_exists("/a/b/c").unwrap());
	assert!(!source.dir_exists("/a/x").unwrap());
}

#[test]
fn root_is_never_its_own_child() {
	let backend = MemoryBackend::new();
	let mut source = open(&backend, "memory:db");
	source.set_value("/", &Value::Int(0)).unwrap();
	source.set_value("/top", &Value::Int(1)).unwrap();

	let names: Vec<_> = source
		.all_entries("/", &[])
		.unwrap()
		.into_iter()
		.map(|(name, _)| name)
		.collect();
	assert_eq!(names, vec!["top"]);
}

#[test]
fn remove_dir_drops_whole_subtree() {
	let backend = MemoryBackend::new();
	let mut source = open(&backend, "memory:db");
	source.set_value("/a/b/x", &Value::Int(1)).unwrap();
	source.set_value("/a/bc", &Value::Int(2)).unwrap();

	source.remove_dir("/a/b").unwrap();
	assert!(!source.dir_exists("/a/b").unwrap());
	assert_eq!(value_of(&*source, "/a/bc"), Some(Value::Int(2)));
}

#[test]
fn schema_association_survives_unset() {
	let backend = MemoryBackend::new();
	let mut source = open(&backend, "memory:db");
	source.set_value("/k", &Value::Int(3)).unwrap();
	source.set_schema("/k", Some("/schemas/k")).unwrap();
	source.unset_value("/k", None).unwrap();

	let stored = source.query_value("/k", &[]).unwrap();
	assert_eq!(stored.value, None);
	assert_eq!(stored.schema_name.as_deref(), Some("/schemas/k"));

	source.set_schema("/k", None).unwrap();
	assert!(source.query_value("/k", &[]).unwrap().is_empty());
	assert!(source.all_entries("/", &[]).unwrap().is_empty());
}

#[test]
fn localized_schemas_resolve_through_locale_chain() {
	let backend = MemoryBackend::new();
	let mut source = open(&backend, "memory:db");
	let schema = |locale: &str, desc: &str| {
		Value::from(
			Schema::new(ValueType::Int)
				.with_default(Value::Int(1))
				.with_locale(locale)
				.with_descriptions(desc, desc),
		)
	};
	source.set_value("/schemas/k", &schema("C", "plain")).unwrap();
	source.set_value("/schemas/k", &schema("de", "deutsch")).unwrap();

	assert_eq!(short_desc(&*source, "de_DE.UTF-8"), "deutsch");
	assert_eq!(short_desc(&*source, "fr_FR"), "plain");

	source.unset_value("/schemas/k", Some("de")).unwrap();
	assert_eq!(short_desc(&*source, "de_DE"), "plain");
}

fn short_desc(source: &dyn Source, locale: &str) -> String {
	let locales = LocaleList::for_locale(locale);
	let value = source.query_value("/schemas/k", &locales).unwrap().value.unwrap();
	value.as_schema().unwrap().short_desc.clone().unwrap()
}
