//! Instruction encoding shared by the compiler, the interpreter and the disassembler.
//!
//! Every field or structure opening is one opcode byte (kind in the low nibble,
//! flags in the high nibble), followed by optional packed integers: extra data
//! first, then a fixed array length. Structure closings carry a packed
//! back-reference to their opening instruction.

use crate::layout::{LayoutError, Result};

/// Field has an entry in the named-field table.
pub const FLAG_NAMED: u8 = 0x10;
/// Field is an array.
pub const FLAG_ARRAY: u8 = 0x20;
/// With [`FLAG_ARRAY`]: size comes from an evaluator. Alone: whole-stream array.
pub const FLAG_EXPR_OR_WHOLE_STREAM: u8 = 0x40;
/// Multi-byte values are little-endian.
pub const FLAG_LITTLE_ENDIAN: u8 = 0x80;

const PACKED_U16: u8 = 0x80;
const PACKED_U32: u8 = 0x81;
const PACKED_EVALUATED: u8 = 0x82;

/// Field kind stored in the low nibble of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldKind {
	/// `align` / `align:N`.
	Align = 0x01,
	/// `bit:N`.
	Bit = 0x02,
	/// `bool`.
	Bool = 0x03,
	/// `ubyte`.
	UByte = 0x04,
	/// `byte`.
	Byte = 0x05,
	/// `ushort`.
	UShort = 0x06,
	/// `short`.
	Short = 0x07,
	/// `int`.
	Int = 0x08,
	/// `long`.
	Long = 0x09,
	/// Structure opening.
	StructStart = 0x0A,
	/// Structure closing.
	StructEnd = 0x0B,
	/// `skip` / `skip:N`.
	Skip = 0x0C,
	/// `var` / `var:N`.
	Var = 0x0D,
	/// `reset$$`.
	ResetCounter = 0x0E,
	/// Processor-defined type.
	Custom = 0x0F,
}

impl FieldKind {
	/// Decode the low nibble of an opcode.
	pub fn from_code(code: u8) -> Option<Self> {
		Some(match code & 0x0F {
			0x01 => Self::Align,
			0x02 => Self::Bit,
			0x03 => Self::Bool,
			0x04 => Self::UByte,
			0x05 => Self::Byte,
			0x06 => Self::UShort,
			0x07 => Self::Short,
			0x08 => Self::Int,
			0x09 => Self::Long,
			0x0A => Self::StructStart,
			0x0B => Self::StructEnd,
			0x0C => Self::Skip,
			0x0D => Self::Var,
			0x0E => Self::ResetCounter,
			0x0F => Self::Custom,
			_ => return None,
		})
	}

	/// Map a script type keyword.
	pub fn from_keyword(name: &str) -> Option<Self> {
		Some(match name {
			"align" => Self::Align,
			"bit" => Self::Bit,
			"bool" => Self::Bool,
			"ubyte" => Self::UByte,
			"byte" => Self::Byte,
			"ushort" => Self::UShort,
			"short" => Self::Short,
			"int" => Self::Int,
			"long" => Self::Long,
			"skip" => Self::Skip,
			"var" => Self::Var,
			"reset$$" => Self::ResetCounter,
			_ => return None,
		})
	}

	/// Lowercase label used by the disassembler.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Align => "align",
			Self::Bit => "bit",
			Self::Bool => "bool",
			Self::UByte => "ubyte",
			Self::Byte => "byte",
			Self::UShort => "ushort",
			Self::Short => "short",
			Self::Int => "int",
			Self::Long => "long",
			Self::StructStart => "struct",
			Self::StructEnd => "end",
			Self::Skip => "skip",
			Self::Var => "var",
			Self::ResetCounter => "reset$$",
			Self::Custom => "custom",
		}
	}

	/// Whether the opcode is followed by extra data.
	pub fn has_extra(self) -> bool {
		matches!(self, Self::Align | Self::Bit | Self::Skip | Self::Var | Self::Custom)
	}

	/// Whether a read value can serve as a size source.
	pub fn is_numeric(self) -> bool {
		matches!(
			self,
			Self::Bit | Self::Bool | Self::UByte | Self::Byte | Self::UShort | Self::Short | Self::Int | Self::Long | Self::Var | Self::Custom
		)
	}
}

/// Decoded packed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packed {
	/// Literal value.
	Value(i32),
	/// Value produced at runtime by the next evaluator.
	Evaluated,
}

/// Append a packed integer.
pub fn write_packed(out: &mut Vec<u8>, value: i32) {
	match value {
		0..=0x7F => out.push(value as u8),
		0x80..=0xFFFF => {
			out.push(PACKED_U16);
			out.extend_from_slice(&(value as u16).to_be_bytes());
		}
		_ => {
			out.push(PACKED_U32);
			out.extend_from_slice(&(value as u32).to_be_bytes());
		}
	}
}

/// Append the marker for an evaluator-computed value.
pub fn write_packed_evaluated(out: &mut Vec<u8>) {
	out.push(PACKED_EVALUATED);
}

/// Read a packed integer at `*pos`, advancing it.
pub fn read_packed(code: &[u8], pos: &mut usize) -> Result<Packed> {
	let at = *pos;
	let corrupt = || LayoutError::CorruptBytecode { at };
	let head = *code.get(at).ok_or_else(corrupt)?;
	let (value, len) = match head {
		0..=0x7F => (Packed::Value(i32::from(head)), 1),
		PACKED_U16 => {
			let raw = code.get(at + 1..at + 3).ok_or_else(corrupt)?;
			(Packed::Value(i32::from(u16::from_be_bytes([raw[0], raw[1]]))), 3)
		}
		PACKED_U32 => {
			let raw = code.get(at + 1..at + 5).ok_or_else(corrupt)?;
			(Packed::Value(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as i32), 5)
		}
		PACKED_EVALUATED => (Packed::Evaluated, 1),
		_ => return Err(corrupt()),
	};
	*pos += len;
	Ok(value)
}

/// How an instruction's element count is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMode {
	/// Single value.
	Scalar,
	/// Count stored in the bytecode.
	Fixed(u32),
	/// Read until the input is exhausted.
	WholeStream,
	/// Count produced by the next evaluator.
	Evaluated,
}

/// One decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
	/// Offset of the opcode byte.
	pub offset: usize,
	/// Field kind.
	pub kind: FieldKind,
	/// High-nibble flags.
	pub flags: u8,
	/// Index into the custom type table, for [`FieldKind::Custom`].
	pub custom_index: Option<usize>,
	/// Extra data, for kinds that carry it.
	pub extra: Option<Packed>,
	/// Element count mode.
	pub array: ArrayMode,
	/// Matching opening offset, for [`FieldKind::StructEnd`].
	pub struct_start: Option<usize>,
	/// Offset of the following instruction.
	pub next: usize,
}

impl Instruction {
	/// Decode the instruction starting at `offset`.
	pub fn decode(code: &[u8], offset: usize) -> Result<Self> {
		let opcode = *code.get(offset).ok_or(LayoutError::CorruptBytecode { at: offset })?;
		let kind = FieldKind::from_code(opcode).ok_or(LayoutError::CorruptBytecode { at: offset })?;
		let flags = opcode & 0xF0;
		let mut pos = offset + 1;

		if kind == FieldKind::StructEnd {
			let Packed::Value(start) = read_packed(code, &mut pos)? else {
				return Err(LayoutError::CorruptBytecode { at: offset });
			};
			return Ok(Self {
				offset,
				kind,
				flags,
				custom_index: None,
				extra: None,
				array: ArrayMode::Scalar,
				struct_start: Some(start as usize),
				next: pos,
			});
		}

		let custom_index = if kind == FieldKind::Custom {
			match read_packed(code, &mut pos)? {
				Packed::Value(index) if index >= 0 => Some(index as usize),
				_ => return Err(LayoutError::CorruptBytecode { at: offset }),
			}
		} else {
			None
		};

		let extra = if kind.has_extra() { Some(read_packed(code, &mut pos)?) } else { None };

		let array = match (flags & FLAG_ARRAY != 0, flags & FLAG_EXPR_OR_WHOLE_STREAM != 0) {
			(false, false) => ArrayMode::Scalar,
			(false, true) => ArrayMode::WholeStream,
			(true, true) => ArrayMode::Evaluated,
			(true, false) => match read_packed(code, &mut pos)? {
				Packed::Value(len) if len >= 0 => ArrayMode::Fixed(len as u32),
				_ => return Err(LayoutError::CorruptBytecode { at: offset }),
			},
		};

		Ok(Self {
			offset,
			kind,
			flags,
			custom_index,
			extra,
			array,
			struct_start: None,
			next: pos,
		})
	}

	/// Whether the instruction has a named-field table entry.
	pub fn is_named(&self) -> bool {
		self.flags & FLAG_NAMED != 0
	}

	/// Whether multi-byte values are little-endian.
	pub fn is_little_endian(&self) -> bool {
		self.flags & FLAG_LITTLE_ENDIAN != 0
	}

	/// Number of evaluator-table entries this instruction consumes.
	pub fn evaluator_count(&self) -> usize {
		usize::from(self.extra == Some(Packed::Evaluated)) + usize::from(self.array == ArrayMode::Evaluated)
	}
}

#[cfg(test)]
mod tests {
	use super::{ArrayMode, FLAG_ARRAY, FLAG_NAMED, FieldKind, Instruction, Packed, read_packed, write_packed, write_packed_evaluated};

	#[test]
	fn packed_widths_follow_magnitude() {
		let mut out = Vec::new();
		write_packed(&mut out, 0x7F);
		assert_eq!(out.len(), 1);
		write_packed(&mut out, 0x80);
		assert_eq!(out.len(), 4);
		write_packed(&mut out, 0x1_0000);
		assert_eq!(out.len(), 9);
		write_packed(&mut out, -1);
		write_packed_evaluated(&mut out);

		let mut pos = 0;
		let decoded: Vec<Packed> = (0..5).map(|_| read_packed(&out, &mut pos).expect("decodes")).collect();
		assert_eq!(
			decoded,
			vec![
				Packed::Value(0x7F),
				Packed::Value(0x80),
				Packed::Value(0x1_0000),
				Packed::Value(-1),
				Packed::Evaluated
			]
		);
		assert_eq!(pos, out.len());
	}

	#[test]
	fn instruction_decodes_extra_then_fixed_length() {
		let mut code = vec![FieldKind::Bit as u8 | FLAG_NAMED | FLAG_ARRAY];
		write_packed(&mut code, 3);
		write_packed(&mut code, 300);
		let insn = Instruction::decode(&code, 0).expect("decodes");
		assert_eq!(insn.kind, FieldKind::Bit);
		assert!(insn.is_named());
		assert_eq!(insn.extra, Some(Packed::Value(3)));
		assert_eq!(insn.array, ArrayMode::Fixed(300));
		assert_eq!(insn.next, code.len());
		assert_eq!(insn.evaluator_count(), 0);
	}

	#[test]
	fn truncated_instruction_is_corrupt() {
		let code = vec![FieldKind::Int as u8 | FLAG_ARRAY];
		assert!(Instruction::decode(&code, 0).is_err());
		assert!(Instruction::decode(&[0x00], 0).is_err());
	}
}
