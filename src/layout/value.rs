use crate::layout::{FieldPath, LayoutError, NamedFieldInfo, PathStep, Result};

/// Decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	/// `bit:N` value; `width` is the number of bits read.
	Bit {
		/// Bits read.
		width: u8,
		/// Unsigned value.
		value: u8,
	},
	/// `bool`: any non-zero byte is true.
	Bool(bool),
	/// `ubyte`.
	UByte(u8),
	/// `byte`.
	Byte(i8),
	/// `ushort`.
	UShort(u16),
	/// `short`.
	Short(i16),
	/// `int`.
	Int(i32),
	/// `long`.
	Long(i64),
	/// `bit:N [..]`.
	BitArray {
		/// Bits per element.
		width: u8,
		/// Element values.
		values: Vec<u8>,
	},
	/// `bool [..]`.
	BoolArray(Vec<bool>),
	/// `ubyte [..]`.
	UByteArray(Vec<u8>),
	/// `byte [..]`.
	ByteArray(Vec<i8>),
	/// `ushort [..]`.
	UShortArray(Vec<u16>),
	/// `short [..]`.
	ShortArray(Vec<i16>),
	/// `int [..]`.
	IntArray(Vec<i32>),
	/// `long [..]`.
	LongArray(Vec<i64>),
	/// Text produced by a var or custom processor.
	String(Box<str>),
	/// Structure.
	Struct(StructValue),
	/// Structure array.
	StructArray(Vec<StructValue>),
}

/// Value type tag used by typed lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
	/// [`Value::Bit`].
	Bit,
	/// [`Value::Bool`].
	Bool,
	/// [`Value::UByte`].
	UByte,
	/// [`Value::Byte`].
	Byte,
	/// [`Value::UShort`].
	UShort,
	/// [`Value::Short`].
	Short,
	/// [`Value::Int`].
	Int,
	/// [`Value::Long`].
	Long,
	/// [`Value::BitArray`].
	BitArray,
	/// [`Value::BoolArray`].
	BoolArray,
	/// [`Value::UByteArray`].
	UByteArray,
	/// [`Value::ByteArray`].
	ByteArray,
	/// [`Value::UShortArray`].
	UShortArray,
	/// [`Value::ShortArray`].
	ShortArray,
	/// [`Value::IntArray`].
	IntArray,
	/// [`Value::LongArray`].
	LongArray,
	/// [`Value::String`].
	String,
	/// [`Value::Struct`].
	Struct,
	/// [`Value::StructArray`].
	StructArray,
}

impl FieldType {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Bit => "bit",
			Self::Bool => "bool",
			Self::UByte => "ubyte",
			Self::Byte => "byte",
			Self::UShort => "ushort",
			Self::Short => "short",
			Self::Int => "int",
			Self::Long => "long",
			Self::BitArray => "bit[]",
			Self::BoolArray => "bool[]",
			Self::UByteArray => "ubyte[]",
			Self::ByteArray => "byte[]",
			Self::UShortArray => "ushort[]",
			Self::ShortArray => "short[]",
			Self::IntArray => "int[]",
			Self::LongArray => "long[]",
			Self::String => "string",
			Self::Struct => "struct",
			Self::StructArray => "struct[]",
		}
	}
}

impl Value {
	/// Type tag of this value.
	pub fn field_type(&self) -> FieldType {
		match self {
			Self::Bit { .. } => FieldType::Bit,
			Self::Bool(_) => FieldType::Bool,
			Self::UByte(_) => FieldType::UByte,
			Self::Byte(_) => FieldType::Byte,
			Self::UShort(_) => FieldType::UShort,
			Self::Short(_) => FieldType::Short,
			Self::Int(_) => FieldType::Int,
			Self::Long(_) => FieldType::Long,
			Self::BitArray { .. } => FieldType::BitArray,
			Self::BoolArray(_) => FieldType::BoolArray,
			Self::UByteArray(_) => FieldType::UByteArray,
			Self::ByteArray(_) => FieldType::ByteArray,
			Self::UShortArray(_) => FieldType::UShortArray,
			Self::ShortArray(_) => FieldType::ShortArray,
			Self::IntArray(_) => FieldType::IntArray,
			Self::LongArray(_) => FieldType::LongArray,
			Self::String(_) => FieldType::String,
			Self::Struct(_) => FieldType::Struct,
			Self::StructArray(_) => FieldType::StructArray,
		}
	}

	/// Numeric value of a scalar, widened to `i64`. Booleans map to `0`/`1`.
	pub fn as_i64(&self) -> Option<i64> {
		Some(match self {
			Self::Bit { value, .. } => i64::from(*value),
			Self::Bool(value) => i64::from(*value),
			Self::UByte(value) => i64::from(*value),
			Self::Byte(value) => i64::from(*value),
			Self::UShort(value) => i64::from(*value),
			Self::Short(value) => i64::from(*value),
			Self::Int(value) => i64::from(*value),
			Self::Long(value) => *value,
			_ => return None,
		})
	}

	/// Whether the value is any kind of array.
	pub fn is_array(&self) -> bool {
		self.array_len().is_some()
	}

	/// Element count of an array value.
	pub fn array_len(&self) -> Option<usize> {
		Some(match self {
			Self::BitArray { values, .. } => values.len(),
			Self::BoolArray(values) => values.len(),
			Self::UByteArray(values) => values.len(),
			Self::ByteArray(values) => values.len(),
			Self::UShortArray(values) => values.len(),
			Self::ShortArray(values) => values.len(),
			Self::IntArray(values) => values.len(),
			Self::LongArray(values) => values.len(),
			Self::StructArray(values) => values.len(),
			_ => return None,
		})
	}

	/// Element `index` of an array value, as a standalone value.
	pub fn element(&self, index: usize) -> Option<Value> {
		Some(match self {
			Self::BitArray { width, values } => Self::Bit {
				width: *width,
				value: *values.get(index)?,
			},
			Self::BoolArray(values) => Self::Bool(*values.get(index)?),
			Self::UByteArray(values) => Self::UByte(*values.get(index)?),
			Self::ByteArray(values) => Self::Byte(*values.get(index)?),
			Self::UShortArray(values) => Self::UShort(*values.get(index)?),
			Self::ShortArray(values) => Self::Short(*values.get(index)?),
			Self::IntArray(values) => Self::Int(*values.get(index)?),
			Self::LongArray(values) => Self::Long(*values.get(index)?),
			Self::StructArray(values) => Self::Struct(values.get(index)?.clone()),
			_ => return None,
		})
	}
}

/// Decoded field plus its named-field entry (absent for unnamed fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
	/// Named-field entry.
	pub info: Option<NamedFieldInfo>,
	/// Decoded value.
	pub value: Value,
}

impl FieldValue {
	/// Field name, if the field is named.
	pub fn name(&self) -> Option<&str> {
		self.info.as_ref().map(|info| &*info.name)
	}

	/// Full dotted path, if the field is named.
	pub fn path(&self) -> Option<&str> {
		self.info.as_ref().map(|info| &*info.path)
	}
}

/// Decoded structure: the root of a parse, a named or anonymous structure, or
/// one element of a structure array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructValue {
	/// Fields in declaration order.
	pub fields: Vec<FieldValue>,
}

impl StructValue {
	/// Direct child with the given name (case-insensitive).
	pub fn field(&self, name: &str) -> Option<&FieldValue> {
		self.fields
			.iter()
			.find(|field| field.name().is_some_and(|field_name| field_name.eq_ignore_ascii_case(name)))
	}

	/// First field anywhere in the tree whose path matches (case-insensitive).
	pub fn find_field_for_path(&self, path: &str) -> Option<&FieldValue> {
		self.find_depth_first(&|field| field.path().is_some_and(|field_path| field_path.eq_ignore_ascii_case(path)))
	}

	/// First field anywhere in the tree with the given name (case-insensitive).
	pub fn find_field_for_name(&self, name: &str) -> Option<&FieldValue> {
		self.find_depth_first(&|field| field.name().is_some_and(|field_name| field_name.eq_ignore_ascii_case(name)))
	}

	/// Like [`StructValue::find_field_for_path`], failing when absent.
	pub fn require_field_for_path(&self, path: &str) -> Result<&FieldValue> {
		self.find_field_for_path(path).ok_or_else(|| LayoutError::FieldNotFound { path: path.to_owned() })
	}

	/// First field of `field_type`, searching this structure and nested
	/// structures in declaration order.
	pub fn find_first_for_type(&self, field_type: FieldType) -> Option<&FieldValue> {
		self.fields_of_type(field_type).into_iter().next()
	}

	/// Last field of `field_type` in declaration order.
	pub fn find_last_for_type(&self, field_type: FieldType) -> Option<&FieldValue> {
		self.fields_of_type(field_type).pop()
	}

	/// The only field of `field_type`; more than one is an error.
	pub fn find_only_for_type(&self, field_type: FieldType) -> Result<Option<&FieldValue>> {
		let mut found = self.fields_of_type(field_type);
		match found.len() {
			0 | 1 => Ok(found.pop()),
			count => Err(LayoutError::AmbiguousField {
				field_type: field_type.as_str(),
				count,
			}),
		}
	}

	/// First field with the given name and type.
	pub fn find_field_for_name_and_type(&self, name: &str, field_type: FieldType) -> Option<&FieldValue> {
		self.fields_of_type(field_type)
			.into_iter()
			.find(|field| field.name().is_some_and(|field_name| field_name.eq_ignore_ascii_case(name)))
	}

	/// Resolve a [`FieldPath`] of field names and indices from this structure.
	pub fn select(&self, path: &FieldPath) -> Result<Value> {
		let not_found = || LayoutError::FieldNotFound { path: path.to_string() };
		let mut current = Value::Struct(self.clone());

		for step in &path.steps {
			current = match (step, &current) {
				(PathStep::Field(name), Value::Struct(item)) => item.field(name).map(|field| field.value.clone()).ok_or_else(not_found)?,
				(PathStep::Index(index), value) => value.element(*index).ok_or_else(not_found)?,
				_ => return Err(not_found()),
			};
		}
		Ok(current)
	}

	fn fields_of_type(&self, field_type: FieldType) -> Vec<&FieldValue> {
		let mut out = Vec::new();
		self.collect_of_type(field_type, &mut out);
		out
	}

	fn collect_of_type<'a>(&'a self, field_type: FieldType, out: &mut Vec<&'a FieldValue>) {
		for field in &self.fields {
			if field.value.field_type() == field_type {
				out.push(field);
			}
			if let Value::Struct(inner) = &field.value {
				inner.collect_of_type(field_type, out);
			}
		}
	}

	fn find_depth_first(&self, matches: &dyn Fn(&FieldValue) -> bool) -> Option<&FieldValue> {
		for field in &self.fields {
			if matches(field) {
				return Some(field);
			}
			let found = match &field.value {
				Value::Struct(inner) => inner.find_depth_first(matches),
				Value::StructArray(items) => items.iter().find_map(|item| item.find_depth_first(matches)),
				_ => None,
			};
			if found.is_some() {
				return found;
			}
		}
		None
	}
}

#[cfg(test)]
mod tests;
