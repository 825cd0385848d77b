use std::fmt::Write as _;

use crate::layout::{ArrayMode, Evaluator, FieldKind, Instruction, Packed, Result, TypeParams};

/// Named-field table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedFieldInfo {
	/// Lowercased dotted path, e.g. `header.len`.
	pub path: Box<str>,
	/// Last path segment.
	pub name: Box<str>,
	/// Bytecode offset of the field instruction.
	pub offset: usize,
}

impl NamedFieldInfo {
	/// Build an entry, deriving `name` from the last segment of `path`.
	pub fn new(path: &str, offset: usize) -> Self {
		let name = path.rsplit('.').next().unwrap_or(path);
		Self {
			path: path.into(),
			name: name.into(),
			offset,
		}
	}

	pub(crate) fn prefix(&mut self, struct_name: &str) {
		self.path = format!("{struct_name}.{}", self.path).into();
	}
}

/// Compiled layout: bytecode plus the side tables the interpreter walks with it.
///
/// Immutable after compilation and shareable across threads; each parse keeps
/// its own cursors.
#[derive(Debug, Clone, Default)]
pub struct CompiledBlock {
	pub(crate) source: String,
	pub(crate) code: Vec<u8>,
	pub(crate) named_fields: Vec<NamedFieldInfo>,
	pub(crate) evaluators: Vec<Evaluator>,
	pub(crate) custom_types: Vec<TypeParams>,
}

impl CompiledBlock {
	/// Script text this block was compiled from.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Raw bytecode.
	pub fn code(&self) -> &[u8] {
		&self.code
	}

	/// Named fields in declaration order.
	pub fn named_fields(&self) -> &[NamedFieldInfo] {
		&self.named_fields
	}

	/// Evaluators in bytecode order.
	pub fn evaluators(&self) -> &[Evaluator] {
		&self.evaluators
	}

	/// Type descriptors of custom fields, indexed from the bytecode.
	pub fn custom_types(&self) -> &[TypeParams] {
		&self.custom_types
	}

	/// Named-field entry with the given path (case-insensitive).
	pub fn find_field_for_path(&self, path: &str) -> Option<(usize, &NamedFieldInfo)> {
		self.named_fields.iter().enumerate().find(|(_, info)| info.path.eq_ignore_ascii_case(path))
	}

	/// Whether any evaluator reads `$name` values.
	pub fn has_external_fields(&self) -> bool {
		self.evaluators.iter().any(Evaluator::uses_external)
	}

	/// Decode every instruction in order.
	pub fn instructions(&self) -> Result<Vec<Instruction>> {
		let mut out = Vec::new();
		let mut pos = 0;
		while pos < self.code.len() {
			let insn = Instruction::decode(&self.code, pos)?;
			pos = insn.next;
			out.push(insn);
		}
		Ok(out)
	}

	/// Human-readable listing of the bytecode, one instruction per line.
	pub fn disassemble(&self) -> Result<String> {
		let mut out = String::new();
		let mut named = self.named_fields.iter();
		let mut evaluators = self.evaluators.iter();
		let mut depth = 0_usize;

		for insn in self.instructions()? {
			if insn.kind == FieldKind::StructEnd {
				depth = depth.saturating_sub(1);
				let _ = writeln!(
					out,
					"{:04x}  {}end -> {:04x}",
					insn.offset,
					"  ".repeat(depth),
					insn.struct_start.unwrap_or_default()
				);
				continue;
			}

			let mut line = format!("{:04x}  {}", insn.offset, "  ".repeat(depth));
			if insn.is_little_endian() {
				line.push('<');
			}
			match insn.custom_index.and_then(|idx| self.custom_types.get(idx)) {
				Some(params) => line.push_str(&params.type_name),
				None => line.push_str(insn.kind.as_str()),
			}
			match insn.extra {
				Some(Packed::Value(value)) => {
					let _ = write!(line, ":{value}");
				}
				Some(Packed::Evaluated) => {
					let expr = evaluators.next().map(ToString::to_string).unwrap_or_default();
					let _ = write!(line, ":({expr})");
				}
				None => {}
			}
			match insn.array {
				ArrayMode::Scalar => {}
				ArrayMode::Fixed(len) => {
					let _ = write!(line, " [{len}]");
				}
				ArrayMode::WholeStream => line.push_str(" [_]"),
				ArrayMode::Evaluated => {
					let expr = evaluators.next().map(ToString::to_string).unwrap_or_default();
					let _ = write!(line, " [{expr}]");
				}
			}
			if insn.is_named() {
				if let Some(info) = named.next() {
					let _ = write!(line, " {}", info.path);
				}
			}

			out.push_str(&line);
			out.push('\n');
			if insn.kind == FieldKind::StructStart {
				depth += 1;
			}
		}

		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::NamedFieldInfo;

	#[test]
	fn name_is_last_path_segment() {
		let mut info = NamedFieldInfo::new("len", 3);
		assert_eq!(&*info.name, "len");
		info.prefix("inner");
		info.prefix("outer");
		assert_eq!(&*info.path, "outer.inner.len");
		assert_eq!(&*info.name, "len");
	}
}
