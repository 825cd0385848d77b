use std::path::Path;

use bitlayout::layout::{CompiledBlock, Result, StructValue, Value, compile};

/// Read and compile a script file.
pub(crate) fn compile_script(path: &Path) -> Result<CompiledBlock> {
	let text = std::fs::read_to_string(path)?;
	compile(&text)
}

/// Parse a `NAME=VALUE` external value argument.
pub(crate) fn parse_ext(input: &str) -> std::result::Result<(String, i32), String> {
	let (name, value) = input.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got {input:?}"))?;
	let name = name.trim().trim_start_matches('$');
	if name.is_empty() {
		return Err(format!("missing name in {input:?}"));
	}

	let value = value.trim();
	let parsed = if let Some(stripped) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		i32::from_str_radix(stripped, 16)
	} else {
		value.parse::<i32>()
	};
	let value = parsed.map_err(|_| format!("invalid value in {input:?}"))?;
	Ok((name.to_owned(), value))
}

/// Render bytes as contiguous lowercase hex.
pub(crate) fn hex(bytes: &[u8]) -> String {
	bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Pretty-print a serializable payload to stdout.
pub(crate) fn emit_json<T: serde::Serialize>(payload: &T) {
	match serde_json::to_string_pretty(payload) {
		Ok(text) => println!("{text}"),
		Err(err) => eprintln!("error: failed to encode json output: {err}"),
	}
}

/// JSON form of a field tree: named fields become object keys, anonymous
/// structures are merged into their parent, other unnamed fields are keyed
/// by position.
pub(crate) fn struct_to_json(item: &StructValue) -> serde_json::Value {
	let mut out = serde_json::Map::new();
	merge_fields(item, &mut out);
	serde_json::Value::Object(out)
}

fn merge_fields(item: &StructValue, out: &mut serde_json::Map<String, serde_json::Value>) {
	for (idx, field) in item.fields.iter().enumerate() {
		match (field.name(), &field.value) {
			(Some(name), value) => {
				out.insert(name.to_owned(), value_to_json(value));
			}
			(None, Value::Struct(inner)) => merge_fields(inner, out),
			(None, value) => {
				out.insert(format!("_{idx}"), value_to_json(value));
			}
		}
	}
}

/// JSON form of one decoded value.
pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
	use serde_json::{Value as JsonValue, json};

	match value {
		Value::Bit { value, .. } => json!(value),
		Value::Bool(v) => json!(v),
		Value::UByte(v) => json!(v),
		Value::Byte(v) => json!(v),
		Value::UShort(v) => json!(v),
		Value::Short(v) => json!(v),
		Value::Int(v) => json!(v),
		Value::Long(v) => json!(v),
		Value::BitArray { values, .. } => json!(values),
		Value::BoolArray(v) => json!(v),
		Value::UByteArray(v) => json!(v),
		Value::ByteArray(v) => json!(v),
		Value::UShortArray(v) => json!(v),
		Value::ShortArray(v) => json!(v),
		Value::IntArray(v) => json!(v),
		Value::LongArray(v) => json!(v),
		Value::String(v) => json!(v),
		Value::Struct(item) => struct_to_json(item),
		Value::StructArray(items) => JsonValue::Array(items.iter().map(struct_to_json).collect()),
	}
}

#[cfg(test)]
mod tests {
	use bitlayout::layout::compile;

	use super::{hex, parse_ext, struct_to_json};

	#[test]
	fn external_arguments() {
		assert_eq!(parse_ext("count=3"), Ok(("count".to_owned(), 3)));
		assert_eq!(parse_ext("$mask=0x10"), Ok(("mask".to_owned(), 16)));
		assert_eq!(parse_ext("n=-2"), Ok(("n".to_owned(), -2)));
		assert!(parse_ext("count").is_err());
		assert!(parse_ext("=1").is_err());
		assert!(parse_ext("n=abc").is_err());
	}

	#[test]
	fn hex_is_lowercase() {
		assert_eq!(hex(&[0x1A, 0x0B, 0xFF]), "1a0bff");
	}

	#[test]
	fn anonymous_structures_merge_into_parent() {
		let block = compile("{ ubyte a; } s [2] { bit:4 b; } ubyte;").expect("compiles");
		let root = block.parse(&[1, 0x21, 3]).expect("parses");
		let json = struct_to_json(&root);
		assert_eq!(json["a"], 1);
		assert_eq!(json["s"][1]["b"], 2);
		assert_eq!(json["_2"], 3);
	}
}
