use confd_primitives::{ErrorKind, Schema, ValueType};
use pretty_assertions::assert_eq;

use super::*;
use crate::memory::MemoryBackend;
use crate::testing::{TestSource, open, seeded};

fn int_schema(default: i32) -> Value {
	Value::from(Schema::new(ValueType::Int).with_default(Value::Int(default)))
}

fn committed(backend: &MemoryBackend, resource: &str, key: &str) -> Option<Value> {
	open(backend, &format!("memory:readonly:{resource}"))
		.query_value(key, &[])
		.unwrap()
		.value
}

#[test]
fn unset_from_first_layer_reveals_second() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![
		open(&backend, "memory:readwrite:user"),
		seeded(&backend, "memory:readonly:system", &[("/a", Value::Int(2))]),
	]);

	sources.set_value("/a", &Value::Int(1)).unwrap();
	let result = sources.query_value("/a", &[], true).unwrap();
	assert_eq!(result.value, Some(Value::Int(1)));
	assert!(result.is_writable);

	sources.unset_value("/a", None).unwrap();
	let result = sources.query_value("/a", &[], true).unwrap();
	assert_eq!(result.value, Some(Value::Int(2)));
	assert!(!result.is_default);
}

#[test]
fn schema_default_only_when_requested() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![open(&backend, "memory:user")]);
	sources.set_value("/schemas/k", &int_schema(42)).unwrap();
	sources.set_schema("/k", Some("/schemas/k")).unwrap();

	let with = sources.query_value("/k", &[], true).unwrap();
	assert_eq!(
		with,
		QueryResult {
			value: Some(Value::Int(42)),
			is_default: true,
			is_writable: true,
			schema_name: Some("/schemas/k".into()),
		}
	);

	let without = sources.query_value("/k", &[], false).unwrap();
	assert_eq!(without.value, None);
	assert!(!without.is_default);

	assert_eq!(
		sources.query_default_value("/k", &[]).unwrap(),
		(Some(Value::Int(42)), true)
	);
}

#[test]
fn empty_schema_key_dissociates() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![open(&backend, "memory:user")]);
	sources.set_value("/schemas/k", &int_schema(1)).unwrap();
	sources.set_schema("/k", Some("/schemas/k")).unwrap();
	sources.set_schema("/k", Some("")).unwrap();
	assert_eq!(sources.query_value("/k", &[], true).unwrap(), QueryResult {
		is_writable: true,
		..QueryResult::default()
	});
}

#[test]
fn earlier_read_only_layer_blocks_invisible_write() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![
		seeded(&backend, "memory:readonly:mandatory", &[("/locked", Value::Bool(true))]),
		open(&backend, "memory:readwrite:user"),
	]);

	let err = sources.set_value("/locked", &Value::Bool(false)).unwrap_err();
	assert_eq!(err.kind(), ErrorKind::NoPermission);
	let result = sources.query_value("/locked", &[], true).unwrap();
	assert!(!result.is_writable);

	sources.set_value("/free", &Value::Int(1)).unwrap();
	assert!(sources.query_value("/free", &[], true).unwrap().is_writable);
}

#[test]
fn writes_without_writable_layer_fail() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![open(&backend, "memory:readonly:sys")]);
	for err in [
		sources.set_value("/k", &Value::Int(1)).unwrap_err(),
		sources.unset_value("/k", None).unwrap_err(),
		sources.set_schema("/k", Some("/s")).unwrap_err(),
		sources.recursive_unset("/", None, UnsetFlags::empty()).unwrap_err(),
	] {
		assert_eq!(err.kind(), ErrorKind::NoWritableDatabase);
	}
}

#[test]
fn invalid_input_is_rejected_before_layers() {
	let mut sources = Sources::default();
	assert_eq!(
		sources.query_value("/a//b", &[], true).unwrap_err().kind(),
		ErrorKind::BadKey
	);
	assert_eq!(
		sources.set_value("relative", &Value::Int(1)).unwrap_err().kind(),
		ErrorKind::BadKey
	);
	assert_eq!(
		sources.set_schema("/k", Some("/bad/")).unwrap_err().kind(),
		ErrorKind::BadKey
	);
}

#[test]
fn unset_touches_first_writable_layer_only() {
	let backend = MemoryBackend::new();
	let mut second = open(&backend, "memory:second");
	second.set_value("/k", &Value::from("second")).unwrap();
	let mut sources = Sources::new(vec![open(&backend, "memory:first"), second]);

	sources.set_value("/k", &Value::from("first")).unwrap();
	sources.unset_value("/k", None).unwrap();
	assert_eq!(
		sources.query_value("/k", &[], false).unwrap().value,
		Some(Value::from("second"))
	);
	sources.unset_value("/never-set", None).unwrap();
}

#[test]
fn recursive_unset_continues_past_failures() {
	let backend = MemoryBackend::new();
	let mut first = open(&backend, "memory:first");
	let mut second = open(&backend, "memory:second");
	for source in [&mut first, &mut second] {
		source.set_value("/a/x", &Value::Int(1)).unwrap();
		source.set_value("/a/y", &Value::Int(2)).unwrap();
	}
	let (first, _) = TestSource::wrap(first);
	let first = first.failing_unset("/a/x");
	let mut sources = Sources::new(vec![Box::new(first) as Box<dyn Source>, second]);

	let report = sources
		.recursive_unset("/a", None, UnsetFlags::empty())
		.unwrap();
	assert_eq!(report.first_error.unwrap().kind(), ErrorKind::Failed);
	assert_eq!(report.affected, vec!["/a/x", "/a/y", "/a"]);

	sources.sync_all().unwrap();
	assert_eq!(committed(&backend, "first", "/a/x"), Some(Value::Int(1)));
	assert_eq!(committed(&backend, "first", "/a/y"), None);
	assert_eq!(committed(&backend, "second", "/a/x"), None);
	assert_eq!(committed(&backend, "second", "/a/y"), None);
}

#[test]
fn recursive_unset_descends_and_drops_schema_names() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![open(&backend, "memory:user")]);
	sources.set_value("/apps/ed/font", &Value::from("mono")).unwrap();
	sources.set_value("/apps/ed/ui/theme", &Value::from("dark")).unwrap();
	sources.set_schema("/apps/ed/size", Some("/schemas/size")).unwrap();

	let report = sources
		.recursive_unset("/apps", None, UnsetFlags::INCLUDING_SCHEMA_NAMES)
		.unwrap();
	assert!(report.first_error.is_none());
	assert_eq!(
		report.affected,
		vec![
			"/apps/ed/ui/theme",
			"/apps/ed/ui",
			"/apps/ed/font",
			"/apps/ed/size",
			"/apps/ed",
			"/apps",
		]
	);
	assert!(!sources.dir_exists("/apps").unwrap());
}

#[test]
fn listings_merge_layers_first_wins() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![
		open(&backend, "memory:user"),
		seeded(&backend, "memory:readonly:system", &[
			("/d/a", Value::Int(2)),
			("/d/b", Value::Int(3)),
			("/d/sub1/y", Value::Int(0)),
			("/d/sub2/z", Value::Int(0)),
		]),
	]);
	sources.set_value("/d/a", &Value::Int(1)).unwrap();
	sources.set_value("/d/sub1/x", &Value::Int(0)).unwrap();
	sources.set_value("/schemas/s", &Value::from(
		Schema::new(ValueType::String).with_default(Value::from("def")),
	))
	.unwrap();
	sources.set_schema("/d/s", Some("/schemas/s")).unwrap();

	let entries: Vec<_> = sources
		.all_entries("/d", &[])
		.unwrap()
		.into_iter()
		.map(|e| (e.key, e.value, e.is_default))
		.collect();
	assert_eq!(entries, vec![
		("/d/a".to_owned(), Some(Value::Int(1)), false),
		("/d/s".to_owned(), Some(Value::from("def")), true),
		("/d/b".to_owned(), Some(Value::Int(3)), false),
	]);
	assert_eq!(sources.all_dirs("/d").unwrap(), vec!["/d/sub1", "/d/sub2"]);
	assert!(sources.dir_exists("/d/sub2").unwrap());
}

#[test]
fn sync_all_reports_first_error_and_syncs_the_rest() {
	let backend = MemoryBackend::new();
	let (failing, spy) = TestSource::wrap(open(&backend, "memory:first"));
	spy.fail_sync(true);
	let mut second = open(&backend, "memory:second");
	second.set_value("/k", &Value::Int(7)).unwrap();
	let mut sources = Sources::new(vec![Box::new(failing) as Box<dyn Source>, second]);

	assert_eq!(sources.sync_all().unwrap_err().kind(), ErrorKind::Failed);
	assert_eq!(spy.syncs(), 1);
	assert_eq!(committed(&backend, "second", "/k"), Some(Value::Int(7)));
}

#[test]
fn from_addresses_skips_unresolvable_entries() {
	let registry = BackendRegistry::with_builtin();
	let sources = Sources::from_addresses(
		["memory:readonly:a", "bogus", "nope:x", "memory:b"],
		&registry,
	);
	assert_eq!(sources.addresses().collect::<Vec<_>>(), vec![
		"memory:readonly:a",
		"memory:b"
	]);
	assert!(sources.has_writable());
}

#[test]
fn root_cannot_hold_a_value() {
	let backend = MemoryBackend::new();
	let mut sources = Sources::new(vec![open(&backend, "memory:user")]);
	sources.set_value("/a", &Value::Int(1)).unwrap();

	for err in [
		sources.set_value("/", &Value::Int(1)).unwrap_err(),
		sources.set_schema("/", Some("/schemas/k")).unwrap_err(),
		sources.set_schema("/k", Some("/")).unwrap_err(),
	] {
		assert_eq!(err.kind(), ErrorKind::BadKey);
	}
	assert_eq!(sources.query_value("/", &[], true).unwrap().value, None);
	let keys: Vec<_> = sources
		.all_entries("/", &[])
		.unwrap()
		.into_iter()
		.map(|e| e.key)
		.collect();
	assert_eq!(keys, vec!["/a"]);
}

#[test]
fn remove_dir_continues_past_failing_layer() {
	let backend = MemoryBackend::new();
	let mut first = open(&backend, "memory:first");
	let mut second = open(&backend, "memory:second");
	for source in [&mut first, &mut second] {
		source.set_value("/d/x", &Value::Int(1)).unwrap();
		source.set_value("/d/sub/y", &Value::Int(2)).unwrap();
	}
	let (first, _) = TestSource::wrap(first);
	let first = first.failing_remove_dir("/d");
	let mut sources = Sources::new(vec![Box::new(first) as Box<dyn Source>, second]);

	let err = sources.remove_dir("/d").unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Failed);

	sources.sync_all().unwrap();
	assert_eq!(committed(&backend, "first", "/d/x"), Some(Value::Int(1)));
	assert_eq!(committed(&backend, "second", "/d/x"), None);
	assert_eq!(committed(&backend, "second", "/d/sub/y"), None);
}
