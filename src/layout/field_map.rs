use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::layout::{CompiledBlock, LayoutError, NamedFieldInfo, Result};

/// Supplies values for `$name` identifiers in size expressions.
pub trait ExternalValueProvider {
	/// Value for `name` (written without `$`), or `None` when unknown.
	fn provide(&self, name: &str, values: &NamedNumericFieldMap<'_>, block: &CompiledBlock) -> Option<i32>;
}

impl<F> ExternalValueProvider for F
where
	F: Fn(&str, &NamedNumericFieldMap<'_>, &CompiledBlock) -> Option<i32>,
{
	fn provide(&self, name: &str, values: &NamedNumericFieldMap<'_>, block: &CompiledBlock) -> Option<i32> {
		self(name, values, block)
	}
}

/// Fixed table of external values, keyed by name without `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalValues(BTreeMap<String, i32>);

impl ExternalValues {
	/// Empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Set `name` to `value`, returning the previous value.
	pub fn insert(&mut self, name: impl Into<String>, value: i32) -> Option<i32> {
		self.0.insert(name.into(), value)
	}

	/// Value for `name`.
	pub fn get(&self, name: &str) -> Option<i32> {
		self.0.get(name).copied()
	}
}

impl<S: Into<String>> FromIterator<(S, i32)> for ExternalValues {
	fn from_iter<I: IntoIterator<Item = (S, i32)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(name, value)| (name.into(), value)).collect())
	}
}

impl ExternalValueProvider for ExternalValues {
	fn provide(&self, name: &str, _values: &NamedNumericFieldMap<'_>, _block: &CompiledBlock) -> Option<i32> {
		self.get(name)
	}
}

/// Last numeric value read for each named field during one parse.
///
/// Entries keep first-insertion order; re-reading a field (inside a structure
/// array) overwrites its value in place.
#[derive(Default)]
pub struct NamedNumericFieldMap<'p> {
	entries: Vec<(NamedFieldInfo, i64)>,
	by_offset: HashMap<usize, usize>,
	provider: Option<&'p dyn ExternalValueProvider>,
}

impl<'p> NamedNumericFieldMap<'p> {
	/// Empty map without an external value provider.
	pub fn new() -> Self {
		Self::default()
	}

	/// Empty map that answers `$name` identifiers through `provider`.
	pub fn with_provider(provider: &'p dyn ExternalValueProvider) -> Self {
		Self {
			provider: Some(provider),
			..Self::default()
		}
	}

	/// Store the latest value for `info`.
	pub fn put(&mut self, info: &NamedFieldInfo, value: i64) {
		match self.by_offset.get(&info.offset) {
			Some(&slot) => self.entries[slot].1 = value,
			None => {
				self.by_offset.insert(info.offset, self.entries.len());
				self.entries.push((info.clone(), value));
			}
		}
	}

	/// Latest value for `info`.
	pub fn get(&self, info: &NamedFieldInfo) -> Option<i64> {
		self.by_offset.get(&info.offset).map(|&slot| self.entries[slot].1)
	}

	/// Latest value for the field at `path` (case-insensitive).
	pub fn get_by_path(&self, path: &str) -> Option<i64> {
		self.entries.iter().find(|(info, _)| info.path.eq_ignore_ascii_case(path)).map(|(_, value)| *value)
	}

	/// Value for named-field table entry `index`, truncated to `i32`.
	pub fn value_at(&self, block: &CompiledBlock, index: usize) -> Result<i32> {
		let info = block.named_fields().get(index).ok_or(LayoutError::CorruptBytecode { at: index })?;
		let value = self.get(info).ok_or_else(|| LayoutError::MissingFieldValue {
			path: info.path.to_string(),
		})?;
		Ok(value as i32)
	}

	/// Ask the provider for `$name`.
	pub fn external_value(&self, name: &str, block: &CompiledBlock) -> Result<i32> {
		self.provider
			.and_then(|provider| provider.provide(name, self, block))
			.ok_or_else(|| LayoutError::ExternalProviderMissing { name: name.to_owned() })
	}

	/// Number of fields with a value.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether no field has a value yet.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries in first-insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&NamedFieldInfo, i64)> {
		self.entries.iter().map(|(info, value)| (info, *value))
	}

	/// Drop all values, keeping the provider.
	pub fn clear(&mut self) {
		self.entries.clear();
		self.by_offset.clear();
	}
}

impl fmt::Debug for NamedNumericFieldMap<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.entries.iter().map(|(info, value)| (&info.path, value))).finish()
	}
}
