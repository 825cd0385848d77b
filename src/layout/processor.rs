use crate::layout::{BitSource, Endianness, NamedFieldInfo, NamedNumericFieldMap, Result, TypeParams, Value};

/// Number of elements a processor is asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCount {
	/// One value, not an array.
	Single,
	/// Array of exactly this many elements.
	Exact(usize),
	/// Array read until the input is exhausted.
	UntilEnd,
}

/// Field being handed to a processor.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
	/// Named-field entry, if the field is named.
	pub info: Option<&'a NamedFieldInfo>,
	/// Byte order from the type prefix.
	pub endianness: Endianness,
	/// Extra data after `:`, literal or evaluated; `0` when absent.
	pub extra: i32,
	/// Requested element count.
	pub count: ElementCount,
}

/// Reads `var` fields, whose layout the script does not describe.
pub trait VarFieldProcessor {
	/// Read one `var` value.
	fn read_var_field(&self, source: &mut dyn BitSource, field: &FieldContext<'_>, values: &NamedNumericFieldMap<'_>) -> Result<Value>;

	/// Read a `var` array; `field.count` is never [`ElementCount::Single`].
	fn read_var_array(&self, source: &mut dyn BitSource, field: &FieldContext<'_>, values: &NamedNumericFieldMap<'_>) -> Result<Value>;
}

/// Supplies extra field types to the compiler and reads them at parse time.
pub trait CustomTypeProcessor {
	/// Lowercase type names handled by this processor.
	fn type_names(&self) -> &[&str];

	/// Whether a declaration is acceptable. `extra` is `None` when it is computed
	/// at runtime.
	fn is_allowed(&self, params: &TypeParams, field_name: Option<&str>, extra: Option<i32>, is_array: bool) -> bool;

	/// Read one custom field or array.
	fn read_custom_field(
		&self,
		source: &mut dyn BitSource,
		params: &TypeParams,
		field: &FieldContext<'_>,
		values: &NamedNumericFieldMap<'_>,
	) -> Result<Value>;
}
