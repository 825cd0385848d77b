use crate::layout::{FieldPath, FieldType, LayoutError, StructValue, Value, compile};

fn sample() -> StructValue {
	let block = compile("ubyte count; hdr { ubyte kind; int size; } items [count] { ubyte id; short[2] pos; } int crc;").expect("compiles");
	block
		.parse(&[2, 7, 0, 0, 0, 9, 1, 0, 1, 0, 2, 2, 0, 3, 0, 4, 0, 0, 1, 0])
		.expect("parses")
}

#[test]
fn path_and_name_lookups() {
	let root = sample();
	assert_eq!(root.find_field_for_path("HDR.Size").map(|field| &field.value), Some(&Value::Int(9)));
	assert_eq!(root.find_field_for_name("kind").and_then(|field| field.path()), Some("hdr.kind"));
	assert_eq!(root.find_field_for_name("id").map(|field| &field.value), Some(&Value::UByte(1)));
	assert!(root.find_field_for_path("size").is_none());

	let err = root.require_field_for_path("hdr.missing").expect_err("absent");
	assert!(matches!(err, LayoutError::FieldNotFound { .. }));
}

#[test]
fn typed_lookups_stay_out_of_structure_arrays() {
	let root = sample();
	assert_eq!(root.find_first_for_type(FieldType::UByte).and_then(|field| field.name()), Some("count"));
	assert_eq!(root.find_last_for_type(FieldType::UByte).and_then(|field| field.name()), Some("kind"));
	assert!(root.find_first_for_type(FieldType::ShortArray).is_none());
	assert_eq!(
		root.find_field_for_name_and_type("crc", FieldType::Int).map(|field| &field.value),
		Some(&Value::Int(256))
	);
	assert!(root.find_field_for_name_and_type("crc", FieldType::Long).is_none());
}

#[test]
fn only_lookup_rejects_ambiguity() {
	let root = sample();
	assert_eq!(
		root.find_only_for_type(FieldType::StructArray)
			.expect("single match")
			.and_then(|field| field.name()),
		Some("items")
	);
	assert!(root.find_only_for_type(FieldType::Long).expect("no match").is_none());

	let err = root.find_only_for_type(FieldType::Int).expect_err("two ints");
	assert!(matches!(err, LayoutError::AmbiguousField { field_type: "int", count: 2 }));
}

#[test]
fn select_walks_fields_and_indices() {
	let root = sample();
	let select = |path: &str| root.select(&FieldPath::parse(path).expect("path parses"));

	assert_eq!(select("items[1].pos[0]").expect("found"), Value::Short(3));
	assert_eq!(select("items[0].id").expect("found"), Value::UByte(1));
	assert_eq!(select("hdr.kind").expect("found"), Value::UByte(7));
	assert_eq!(select("items").expect("found").array_len(), Some(2));

	for path in ["items[2]", "hdr[0]", "count.x", "nope"] {
		assert!(matches!(select(path), Err(LayoutError::FieldNotFound { .. })), "{path:?}");
	}
}

#[test]
fn value_helpers() {
	let bits = Value::BitArray { width: 3, values: vec![1, 7] };
	assert_eq!(bits.element(1), Some(Value::Bit { width: 3, value: 7 }));
	assert_eq!(bits.field_type().as_str(), "bit[]");
	assert!(bits.is_array());
	assert_eq!(bits.as_i64(), None);
	assert_eq!(Value::Bool(true).as_i64(), Some(1));
	assert_eq!(Value::Byte(-3).as_i64(), Some(-3));
	assert!(!Value::String("x".into()).is_array());
}
