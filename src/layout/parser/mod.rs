//! Bytecode interpreter.
//!
//! Walks a [`CompiledBlock`] with three cursors (bytecode, named-field table,
//! evaluator table) against a [`BitSource`], producing a [`StructValue`] tree.
//! Structure arrays rewind the cursors to the start of the body for every
//! element; zero-length arrays walk the body in skip mode so the cursors stay
//! in step without touching the input.

use crate::layout::bytecode::{ArrayMode, Instruction, Packed};
use crate::layout::{
	BitOrder, BitReader, BitSource, CompiledBlock, CustomTypeProcessor, ElementCount, Endianness, ExternalValueProvider, FieldContext, FieldKind,
	FieldValue, LayoutError, NamedFieldInfo, NamedNumericFieldMap, Result, StructValue, Value, VarFieldProcessor,
};

/// Runtime limits and input interpretation.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
	/// Bit order for sub-byte reads of [`LayoutParser::parse_bytes`].
	pub bit_order: BitOrder,
	/// Return the fields read so far instead of failing at end of input.
	pub skip_remaining_fields_if_eof: bool,
	/// Maximum structure nesting depth.
	pub max_depth: u32,
	/// Maximum element count of a single array.
	pub max_array_elems: usize,
}

impl Default for ParserOptions {
	fn default() -> Self {
		Self {
			bit_order: BitOrder::Lsb0,
			skip_remaining_fields_if_eof: false,
			max_depth: 64,
			max_array_elems: 16 * 1024 * 1024,
		}
	}
}

impl ParserOptions {
	/// Default limits with most-significant-bit-first sub-byte reads.
	pub fn msb0() -> Self {
		Self {
			bit_order: BitOrder::Msb0,
			..Self::default()
		}
	}

	/// Default limits, stopping quietly at end of input.
	pub fn tolerant() -> Self {
		Self {
			skip_remaining_fields_if_eof: true,
			..Self::default()
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursors {
	code: usize,
	named: usize,
	eval: usize,
}

struct ParseState {
	at: Cursors,
	halted: bool,
}

/// Applies a compiled layout to binary input.
///
/// A parser borrows its block and collaborators; it holds no per-parse state,
/// so one parser can run any number of parses.
pub struct LayoutParser<'a> {
	block: &'a CompiledBlock,
	options: ParserOptions,
	var_processor: Option<&'a dyn VarFieldProcessor>,
	custom_processor: Option<&'a dyn CustomTypeProcessor>,
	provider: Option<&'a dyn ExternalValueProvider>,
}

impl<'a> LayoutParser<'a> {
	/// Parser with default options and no collaborators.
	pub fn new(block: &'a CompiledBlock) -> Self {
		Self {
			block,
			options: ParserOptions::default(),
			var_processor: None,
			custom_processor: None,
			provider: None,
		}
	}

	/// Replace the options.
	pub fn with_options(mut self, options: ParserOptions) -> Self {
		self.options = options;
		self
	}

	/// Reader for `var` fields.
	pub fn with_var_processor(mut self, processor: &'a dyn VarFieldProcessor) -> Self {
		self.var_processor = Some(processor);
		self
	}

	/// Reader for custom-type fields.
	pub fn with_custom_processor(mut self, processor: &'a dyn CustomTypeProcessor) -> Self {
		self.custom_processor = Some(processor);
		self
	}

	/// Source of `$name` values.
	pub fn with_provider(mut self, provider: &'a dyn ExternalValueProvider) -> Self {
		self.provider = Some(provider);
		self
	}

	/// Active options.
	pub fn options(&self) -> &ParserOptions {
		&self.options
	}

	/// Parse an in-memory buffer using the configured bit order.
	pub fn parse_bytes(&self, bytes: &[u8]) -> Result<StructValue> {
		let mut reader = BitReader::new(bytes, self.options.bit_order);
		self.parse(&mut reader)
	}

	/// Parse from any bit source.
	pub fn parse(&self, source: &mut dyn BitSource) -> Result<StructValue> {
		let mut values = match self.provider {
			Some(provider) => NamedNumericFieldMap::with_provider(provider),
			None => NamedNumericFieldMap::new(),
		};
		self.parse_with_values(source, &mut values)
	}

	/// Parse from any bit source, leaving the numeric field values in `values`.
	pub fn parse_with_values(&self, source: &mut dyn BitSource, values: &mut NamedNumericFieldMap<'_>) -> Result<StructValue> {
		values.clear();
		let mut state = ParseState {
			at: Cursors { code: 0, named: 0, eval: 0 },
			halted: false,
		};

		let fields = self.parse_body(&mut state, source, values, 0, false)?;
		log::debug!(
			"parsed layout: fields={} numeric={} consumed={}B halted={}",
			fields.len(),
			values.len(),
			source.byte_counter(),
			state.halted
		);
		Ok(StructValue { fields })
	}

	fn parse_body(&self, state: &mut ParseState, source: &mut dyn BitSource, values: &mut NamedNumericFieldMap<'_>, depth: u32, skip: bool) -> Result<Vec<FieldValue>> {
		let code = self.block.code();
		let mut fields = Vec::new();

		while state.at.code < code.len() {
			let insn = Instruction::decode(code, state.at.code)?;
			state.at.code = insn.next;

			if insn.kind == FieldKind::StructEnd {
				if depth == 0 {
					return Err(LayoutError::CorruptBytecode { at: insn.offset });
				}
				return Ok(fields);
			}

			let info = if insn.is_named() {
				let info = self
					.block
					.named_fields()
					.get(state.at.named)
					.ok_or(LayoutError::CorruptBytecode { at: insn.offset })?;
				state.at.named += 1;
				Some(info)
			} else {
				None
			};

			if skip {
				state.at.eval += insn.evaluator_count();
				if insn.kind == FieldKind::StructStart {
					self.parse_body(state, source, values, depth + 1, true)?;
				}
				continue;
			}

			let extra = match insn.extra {
				Some(Packed::Value(value)) => value,
				Some(Packed::Evaluated) => self.next_evaluator(state, source, values)?,
				None => 0,
			};
			let count = match insn.array {
				ArrayMode::Scalar => ElementCount::Single,
				ArrayMode::Fixed(len) => ElementCount::Exact(len as usize),
				ArrayMode::WholeStream => ElementCount::UntilEnd,
				ArrayMode::Evaluated => {
					let len = self.next_evaluator(state, source, values)?;
					if len < 0 {
						return Err(LayoutError::NegativeArrayLength { at: insn.offset, len });
					}
					ElementCount::Exact(len as usize)
				}
			};
			if let ElementCount::Exact(len) = count {
				if len > self.options.max_array_elems {
					return Err(LayoutError::ArrayTooLarge {
						count: len,
						max: self.options.max_array_elems,
					});
				}
			}

			if self.options.skip_remaining_fields_if_eof && !source.has_more() && reads_input(insn.kind, count) {
				log::warn!("input exhausted before {} at {:04x}, skipping remaining fields", insn.kind.as_str(), insn.offset);
				state.halted = true;
				return Ok(fields);
			}

			log::trace!("{:04x} {} count={count:?} extra={extra} at byte {}", insn.offset, insn.kind.as_str(), source.byte_counter());

			if insn.kind == FieldKind::StructStart {
				if depth + 1 > self.options.max_depth {
					return Err(LayoutError::DepthExceeded {
						max_depth: self.options.max_depth,
					});
				}
				let value = self.read_struct(state, source, values, depth + 1, count)?;
				fields.push(FieldValue { info: info.cloned(), value });
				if state.halted {
					return Ok(fields);
				}
				continue;
			}

			match self.read_field(&insn, info, extra, count, source, values, &mut state.halted) {
				Ok(Some(value)) => {
					if let (Some(info), Some(number)) = (info, value.as_i64()) {
						values.put(info, number);
					}
					fields.push(FieldValue { info: info.cloned(), value });
				}
				Ok(None) => {}
				Err(err) if err.is_eof() && self.options.skip_remaining_fields_if_eof => {
					log::warn!("input ended inside {} at {:04x}: {err}", insn.kind.as_str(), insn.offset);
					state.halted = true;
				}
				Err(err) => return Err(err),
			}
			if state.halted {
				return Ok(fields);
			}
		}

		if depth > 0 {
			return Err(LayoutError::CorruptBytecode { at: state.at.code });
		}
		Ok(fields)
	}

	fn read_struct(&self, state: &mut ParseState, source: &mut dyn BitSource, values: &mut NamedNumericFieldMap<'_>, depth: u32, count: ElementCount) -> Result<Value> {
		let body = state.at;
		match count {
			ElementCount::Single => {
				let fields = self.parse_body(state, source, values, depth, false)?;
				Ok(Value::Struct(StructValue { fields }))
			}
			ElementCount::Exact(0) => {
				self.parse_body(state, source, values, depth, true)?;
				Ok(Value::StructArray(Vec::new()))
			}
			ElementCount::Exact(len) => {
				let mut items = Vec::with_capacity(len.min(4096));
				for _ in 0..len {
					state.at = body;
					let fields = self.parse_body(state, source, values, depth, false)?;
					if state.halted {
						break;
					}
					items.push(StructValue { fields });
				}
				Ok(Value::StructArray(items))
			}
			ElementCount::UntilEnd => {
				let mut items = Vec::new();
				while source.has_more() {
					if items.len() >= self.options.max_array_elems {
						return Err(LayoutError::ArrayTooLarge {
							count: items.len() + 1,
							max: self.options.max_array_elems,
						});
					}
					state.at = body;
					let consumed = source.bits_consumed();
					let fields = self.parse_body(state, source, values, depth, false)?;
					if state.halted {
						break;
					}
					if source.bits_consumed() == consumed {
						log::debug!("structure body read no input, ending whole-stream array after {} items", items.len());
						break;
					}
					items.push(StructValue { fields });
				}
				if items.is_empty() && !state.halted {
					state.at = body;
					self.parse_body(state, source, values, depth, true)?;
				}
				Ok(Value::StructArray(items))
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	fn read_field(
		&self,
		insn: &Instruction,
		info: Option<&NamedFieldInfo>,
		extra: i32,
		count: ElementCount,
		source: &mut dyn BitSource,
		values: &NamedNumericFieldMap<'_>,
		halted: &mut bool,
	) -> Result<Option<Value>> {
		let endianness = if insn.is_little_endian() { Endianness::Little } else { Endianness::Big };
		let single = count == ElementCount::Single;

		let value = match insn.kind {
			FieldKind::Align => {
				let bytes = non_negative(insn, extra)?;
				source.align_to(u64::from(bytes.max(1)))?;
				return Ok(None);
			}
			FieldKind::Skip => {
				source.skip_bytes(u64::from(non_negative(insn, extra)?))?;
				return Ok(None);
			}
			FieldKind::ResetCounter => {
				source.reset_counter();
				return Ok(None);
			}
			FieldKind::Bit => {
				let width = u8::try_from(extra)
					.ok()
					.filter(|width| (1..=8).contains(width))
					.ok_or(LayoutError::InvalidBitWidth { at: insn.offset, width: extra })?;
				if single {
					Value::Bit {
						width,
						value: source.read_bits(width)?,
					}
				} else if count == ElementCount::UntilEnd {
					// trailing value keeps whatever bits are left
					Value::BitArray {
						width,
						values: self.read_elements(source, count, halted, |s| s.read_bits_upto(width).map(|(value, _)| value))?,
					}
				} else {
					Value::BitArray {
						width,
						values: self.read_elements(source, count, halted, |s| s.read_bits(width))?,
					}
				}
			}
			FieldKind::Bool if single => Value::Bool(source.read_u8()? != 0),
			FieldKind::Bool => Value::BoolArray(self.read_elements(source, count, halted, |s| Ok(s.read_u8()? != 0))?),
			FieldKind::UByte if single => Value::UByte(source.read_u8()?),
			FieldKind::UByte => Value::UByteArray(self.read_elements(source, count, halted, |s| s.read_u8())?),
			FieldKind::Byte if single => Value::Byte(source.read_u8()? as i8),
			FieldKind::Byte => Value::ByteArray(self.read_elements(source, count, halted, |s| Ok(s.read_u8()? as i8))?),
			FieldKind::UShort if single => Value::UShort(source.read_u16(endianness)?),
			FieldKind::UShort => Value::UShortArray(self.read_elements(source, count, halted, |s| s.read_u16(endianness))?),
			FieldKind::Short if single => Value::Short(source.read_u16(endianness)? as i16),
			FieldKind::Short => Value::ShortArray(self.read_elements(source, count, halted, |s| Ok(s.read_u16(endianness)? as i16))?),
			FieldKind::Int if single => Value::Int(source.read_u32(endianness)? as i32),
			FieldKind::Int => Value::IntArray(self.read_elements(source, count, halted, |s| Ok(s.read_u32(endianness)? as i32))?),
			FieldKind::Long if single => Value::Long(source.read_u64(endianness)? as i64),
			FieldKind::Long => Value::LongArray(self.read_elements(source, count, halted, |s| Ok(s.read_u64(endianness)? as i64))?),
			FieldKind::Var => {
				let processor = self.var_processor.ok_or(LayoutError::VarProcessorMissing { at: insn.offset })?;
				let field = FieldContext {
					info,
					endianness,
					extra,
					count,
				};
				if single {
					processor.read_var_field(source, &field, values)?
				} else {
					processor.read_var_array(source, &field, values)?
				}
			}
			FieldKind::Custom => {
				let params = insn
					.custom_index
					.and_then(|index| self.block.custom_types().get(index))
					.ok_or(LayoutError::CorruptBytecode { at: insn.offset })?;
				let processor = self.custom_processor.ok_or_else(|| LayoutError::CustomProcessorMissing {
					at: insn.offset,
					type_name: params.type_name.clone(),
				})?;
				let field = FieldContext {
					info,
					endianness,
					extra,
					count,
				};
				processor.read_custom_field(source, params, &field, values)?
			}
			FieldKind::StructStart | FieldKind::StructEnd => return Err(LayoutError::CorruptBytecode { at: insn.offset }),
		};
		Ok(Some(value))
	}

	fn read_elements<T>(
		&self,
		source: &mut dyn BitSource,
		count: ElementCount,
		halted: &mut bool,
		mut read: impl FnMut(&mut dyn BitSource) -> Result<T>,
	) -> Result<Vec<T>> {
		let max = self.options.max_array_elems;
		let mut out = match count {
			ElementCount::Exact(len) => Vec::with_capacity(len.min(4096)),
			ElementCount::Single => Vec::with_capacity(1),
			ElementCount::UntilEnd => Vec::new(),
		};

		loop {
			let done = match count {
				ElementCount::Single => out.len() == 1,
				ElementCount::Exact(len) => out.len() >= len,
				ElementCount::UntilEnd => !source.has_more(),
			};
			if done {
				break;
			}
			if out.len() >= max {
				return Err(LayoutError::ArrayTooLarge { count: out.len() + 1, max });
			}

			match read(&mut *source) {
				Ok(item) => out.push(item),
				Err(err) if err.is_eof() && self.options.skip_remaining_fields_if_eof => {
					log::warn!("input ended after {} array elements", out.len());
					*halted = true;
					break;
				}
				Err(err) => return Err(err),
			}
		}
		Ok(out)
	}

	fn next_evaluator(&self, state: &mut ParseState, source: &dyn BitSource, values: &NamedNumericFieldMap<'_>) -> Result<i32> {
		let evaluator = self
			.block
			.evaluators()
			.get(state.at.eval)
			.ok_or(LayoutError::CorruptBytecode { at: state.at.code })?;
		state.at.eval += 1;
		evaluator.eval(source.byte_counter(), self.block, values)
	}
}

impl CompiledBlock {
	/// Parse `bytes` with default options and no collaborators.
	pub fn parse(&self, bytes: &[u8]) -> Result<StructValue> {
		LayoutParser::new(self).parse_bytes(bytes)
	}
}

fn non_negative(insn: &Instruction, value: i32) -> Result<u32> {
	u32::try_from(value).map_err(|_| LayoutError::NegativeExtraValue { at: insn.offset, value })
}

fn reads_input(kind: FieldKind, count: ElementCount) -> bool {
	!matches!(count, ElementCount::Exact(0) | ElementCount::UntilEnd) && !matches!(kind, FieldKind::Align | FieldKind::ResetCounter)
}
