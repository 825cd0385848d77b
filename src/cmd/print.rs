use bitlayout::layout::{StructValue, Value};

/// Output truncation limits for decoded values.
#[derive(Debug, Clone, Copy)]
pub struct PrintOptions {
	/// Maximum number of fields printed for a single structure.
	pub max_fields_per_struct: usize,
	/// Maximum number of Unicode scalar values printed for strings.
	pub max_string_len: usize,
	/// Maximum number of elements printed for arrays.
	pub max_array_items: usize,
	/// Maximum recursive print depth for nested structures.
	pub max_print_depth: u32,
}

impl Default for PrintOptions {
	fn default() -> Self {
		Self {
			max_fields_per_struct: 200,
			max_string_len: 200,
			max_array_items: 32,
			max_print_depth: 8,
		}
	}
}

/// Print the fields of a structure, one per line.
pub fn print_struct(item: &StructValue, indent: usize, depth: u32, options: PrintOptions) {
	let pad = " ".repeat(indent);
	for field in item.fields.iter().take(options.max_fields_per_struct) {
		let name = field.name().unwrap_or("_");
		match &field.value {
			Value::Struct(inner) => {
				println!("{pad}{name}: struct {{");
				print_nested(inner, indent, depth, options);
				println!("{pad}}}");
			}
			Value::StructArray(items) => {
				println!("{pad}{name}: struct[{}] [", items.len());
				print_struct_items(items, indent + 2, depth, options);
				println!("{pad}]");
			}
			value => println!("{pad}{name}: {} = {}", value.field_type().as_str(), render_value(value, options)),
		}
	}
	if item.fields.len() > options.max_fields_per_struct {
		println!("{pad}... {} more fields", item.fields.len() - options.max_fields_per_struct);
	}
}

/// Print one value selected out of a tree.
pub fn print_value(value: &Value, options: PrintOptions) {
	match value {
		Value::Struct(item) => {
			println!("struct {{");
			print_nested(item, 0, 0, options);
			println!("}}");
		}
		Value::StructArray(items) => {
			println!("struct[{}] [", items.len());
			print_struct_items(items, 2, 0, options);
			println!("]");
		}
		value => println!("{} = {}", value.field_type().as_str(), render_value(value, options)),
	}
}

fn print_nested(item: &StructValue, indent: usize, depth: u32, options: PrintOptions) {
	if depth + 1 >= options.max_print_depth {
		println!("{}  ... {} fields", " ".repeat(indent), item.fields.len());
		return;
	}
	print_struct(item, indent + 2, depth + 1, options);
}

fn print_struct_items(items: &[StructValue], indent: usize, depth: u32, options: PrintOptions) {
	let pad = " ".repeat(indent);
	for (idx, item) in items.iter().enumerate().take(options.max_array_items) {
		println!("{pad}[{idx}] {{");
		print_nested(item, indent, depth, options);
		println!("{pad}}}");
	}
	if items.len() > options.max_array_items {
		println!("{pad}... {} more", items.len() - options.max_array_items);
	}
}

/// Render a non-structure value on one line.
pub fn render_value(value: &Value, options: PrintOptions) -> String {
	match value {
		Value::Bit { value, .. } => value.to_string(),
		Value::Bool(v) => v.to_string(),
		Value::UByte(v) => v.to_string(),
		Value::Byte(v) => v.to_string(),
		Value::UShort(v) => v.to_string(),
		Value::Short(v) => v.to_string(),
		Value::Int(v) => v.to_string(),
		Value::Long(v) => v.to_string(),
		Value::BitArray { values, .. } => render_list(values, options),
		Value::BoolArray(v) => render_list(v, options),
		Value::UByteArray(v) => render_list(v, options),
		Value::ByteArray(v) => render_list(v, options),
		Value::UShortArray(v) => render_list(v, options),
		Value::ShortArray(v) => render_list(v, options),
		Value::IntArray(v) => render_list(v, options),
		Value::LongArray(v) => render_list(v, options),
		Value::String(v) => format!("\"{}\"", truncate(v, options.max_string_len)),
		Value::Struct(item) => format!("struct {{ {} fields }}", item.fields.len()),
		Value::StructArray(items) => format!("struct[{}]", items.len()),
	}
}

fn render_list<T: ToString>(items: &[T], options: PrintOptions) -> String {
	let mut parts: Vec<String> = items.iter().take(options.max_array_items).map(ToString::to_string).collect();
	if items.len() > options.max_array_items {
		parts.push(format!("... {} more", items.len() - options.max_array_items));
	}
	format!("[{}]", parts.join(", "))
}

fn truncate(input: &str, max_chars: usize) -> String {
	if input.chars().count() <= max_chars {
		return input.to_owned();
	}
	let mut out: String = input.chars().take(max_chars).collect();
	out.push_str("...");
	out
}

#[cfg(test)]
mod tests {
	use bitlayout::layout::Value;

	use super::{PrintOptions, render_value};

	#[test]
	fn long_arrays_are_truncated() {
		let options = PrintOptions {
			max_array_items: 2,
			..PrintOptions::default()
		};
		assert_eq!(render_value(&Value::UByteArray(vec![1, 2, 3, 4]), options), "[1, 2, ... 2 more]");
		assert_eq!(render_value(&Value::BoolArray(vec![true]), options), "[true]");
	}

	#[test]
	fn strings_are_quoted_and_truncated() {
		let options = PrintOptions {
			max_string_len: 3,
			..PrintOptions::default()
		};
		assert_eq!(render_value(&Value::String("abcdef".into()), options), "\"abc...\"");
		assert_eq!(render_value(&Value::Bit { width: 3, value: 5 }, options), "5");
	}
}
