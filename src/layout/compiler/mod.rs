//! Script compiler: token stream in, [`CompiledBlock`] out.

use crate::layout::bytecode::{FLAG_ARRAY, FLAG_EXPR_OR_WHOLE_STREAM, FLAG_LITTLE_ENDIAN, FLAG_NAMED, write_packed, write_packed_evaluated};
use crate::layout::evaluator::EvaluatorFactory;
use crate::layout::{
	CompiledBlock, CustomTypeProcessor, Endianness, Evaluator, FieldKind, LayoutError, NamedFieldInfo, Result, SizeSpec, Token, TokenKind, Tokenizer, TypeParams,
};

/// Collaborators consulted while compiling.
#[derive(Default, Clone, Copy)]
pub struct CompilerOptions<'a> {
	/// Processor that declares custom type names. Without one, unknown type
	/// names are compile errors.
	pub custom_types: Option<&'a dyn CustomTypeProcessor>,
}

impl<'a> CompilerOptions<'a> {
	/// Options accepting the custom types of `processor`.
	pub fn with_custom_types(processor: &'a dyn CustomTypeProcessor) -> Self {
		Self {
			custom_types: Some(processor),
		}
	}
}

/// Compile a script using built-in types only.
pub fn compile(script: &str) -> Result<CompiledBlock> {
	compile_with(script, &CompilerOptions::default())
}

/// Compile a script with custom types and other collaborators.
pub fn compile_with(script: &str, options: &CompilerOptions<'_>) -> Result<CompiledBlock> {
	let custom_names: Vec<&str> = options.custom_types.map(|processor| processor.type_names().to_vec()).unwrap_or_default();

	let mut compiler = Compiler::new(options.custom_types);
	for token in Tokenizer::with_custom_types(script, &custom_names) {
		let token = token?;
		log::trace!("token {:>5} {:?}", token.position, token.render());
		compiler.push(&token)?;
	}
	let block = compiler.finish(script)?;

	log::debug!(
		"compiled layout: code={}B named={} evaluators={} custom={}",
		block.code.len(),
		block.named_fields.len(),
		block.evaluators.len(),
		block.custom_types.len()
	);
	Ok(block)
}

struct NamedMeta {
	kind: FieldKind,
	is_array: bool,
	array_scopes: Vec<u32>,
}

struct OpenStruct {
	start: usize,
	at: usize,
	token: String,
	name: Option<String>,
	named_from: usize,
	array_scope: Option<u32>,
}

struct Compiler<'o> {
	custom: Option<&'o dyn CustomTypeProcessor>,
	code: Vec<u8>,
	named: Vec<NamedFieldInfo>,
	meta: Vec<NamedMeta>,
	evaluators: Vec<Evaluator>,
	custom_types: Vec<TypeParams>,
	open: Vec<OpenStruct>,
	next_scope: u32,
	whole_stream_depth: Option<usize>,
}

impl<'o> Compiler<'o> {
	fn new(custom: Option<&'o dyn CustomTypeProcessor>) -> Self {
		Self {
			custom,
			code: Vec::new(),
			named: Vec::new(),
			meta: Vec::new(),
			evaluators: Vec::new(),
			custom_types: Vec::new(),
			open: Vec::new(),
			next_scope: 0,
			whole_stream_depth: None,
		}
	}

	fn push(&mut self, token: &Token) -> Result<()> {
		if token.kind == TokenKind::Comment {
			return Ok(());
		}

		if let Some(depth) = self.whole_stream_depth {
			if token.kind != TokenKind::StructEnd && self.open.len() <= depth {
				return Err(LayoutError::FieldAfterWholeStream {
					at: token.position,
					token: token.render(),
				});
			}
		}

		match token.kind {
			TokenKind::StructStart => self.open_struct(token),
			TokenKind::StructEnd => self.close_struct(token),
			TokenKind::Atom => self.field(token),
			TokenKind::Comment => Ok(()),
		}
	}

	fn open_struct(&mut self, token: &Token) -> Result<()> {
		let offset = self.code.len();
		let array = self.array_spec(token)?;
		let name = token.name.as_deref().map(str::to_ascii_lowercase);

		let mut flags = 0;
		if let Some(name) = &name {
			flags |= FLAG_NAMED;
			self.register(token, name, offset, FieldKind::StructStart, array.is_some())?;
		}
		self.emit(FieldKind::StructStart, flags, None, None, array.as_ref());

		let array_scope = array.is_some().then(|| {
			self.next_scope += 1;
			self.next_scope
		});
		self.open.push(OpenStruct {
			start: offset,
			at: token.position,
			token: token.render(),
			name,
			named_from: self.named.len(),
			array_scope,
		});
		Ok(())
	}

	fn close_struct(&mut self, token: &Token) -> Result<()> {
		let Some(frame) = self.open.pop() else {
			return Err(LayoutError::UnmatchedStructEnd { at: token.position });
		};

		self.code.push(FieldKind::StructEnd as u8);
		write_packed(&mut self.code, frame.start as i32);

		if let Some(name) = &frame.name {
			for info in &mut self.named[frame.named_from..] {
				info.prefix(name);
			}
		}
		Ok(())
	}

	fn field(&mut self, token: &Token) -> Result<()> {
		let at = token.position;
		let Some(params) = &token.type_params else {
			return Err(LayoutError::Lexical {
				at,
				text: token.render(),
				reason: "field type is missing",
			});
		};

		let kind = match FieldKind::from_keyword(&params.type_name) {
			Some(kind) => kind,
			None if self.is_custom_type(&params.type_name) => FieldKind::Custom,
			None => {
				return Err(LayoutError::UnknownType {
					at,
					token: token.render(),
					type_name: params.type_name.clone(),
				});
			}
		};

		if matches!(kind, FieldKind::Align | FieldKind::Skip | FieldKind::ResetCounter) {
			if token.name.is_some() {
				return Err(LayoutError::ModifierMisuse {
					at,
					token: token.render(),
					reason: "align, skip and reset$$ must not be named",
				});
			}
			if token.is_array() {
				return Err(LayoutError::ModifierMisuse {
					at,
					token: token.render(),
					reason: "align, skip and reset$$ must not be arrays",
				});
			}
		}

		if !kind.has_extra() {
			if let Some(extra) = &params.extra {
				return Err(LayoutError::InvalidExtraData {
					at,
					token: token.render(),
					extra: extra.clone(),
				});
			}
		}

		let extra = if kind.has_extra() { Some(self.extra_spec(token, kind, params)?) } else { None };
		let array = self.array_spec(token)?;

		let custom_index = if kind == FieldKind::Custom {
			let literal_extra = match &extra {
				Some(SizeSpec::Fixed(value)) => Some(*value),
				_ => None,
			};
			let allowed = self
				.custom
				.is_some_and(|processor| processor.is_allowed(params, token.name.as_deref(), literal_extra, array.is_some()));
			if !allowed {
				return Err(LayoutError::CustomTypeRejected {
					at,
					token: token.render(),
					type_name: params.type_name.clone(),
				});
			}
			self.custom_types.push(params.clone());
			Some(self.custom_types.len() - 1)
		} else {
			None
		};

		let offset = self.code.len();
		let mut flags = 0;
		if params.endianness == Endianness::Little {
			flags |= FLAG_LITTLE_ENDIAN;
		}
		if let Some(name) = &token.name {
			flags |= FLAG_NAMED;
			self.register(token, &name.to_ascii_lowercase(), offset, kind, array.is_some())?;
		}

		self.emit(kind, flags, custom_index, extra, array.as_ref());
		Ok(())
	}

	fn extra_spec(&self, token: &Token, kind: FieldKind, params: &TypeParams) -> Result<SizeSpec> {
		let Some(text) = params.extra.as_deref() else {
			let default = match kind {
				FieldKind::Bit | FieldKind::Align | FieldKind::Skip => 1,
				_ => 0,
			};
			return Ok(SizeSpec::Fixed(default));
		};

		let invalid = || LayoutError::InvalidExtraData {
			at: token.position,
			token: token.render(),
			extra: text.to_owned(),
		};

		let spec = if params.extra_is_expression() {
			let rendered = token.render();
			let resolve = |name: &str| self.resolve_size_source(token, &rendered, name);
			EvaluatorFactory {
				at: token.position,
				token: &rendered,
				resolve: &resolve,
			}
			.extra(text)?
		} else {
			let value = text.parse::<i64>().map_err(|_| invalid())?;
			if kind == FieldKind::Bit && !(1..=8).contains(&value) {
				return Err(LayoutError::BitWidthOutOfRange {
					at: token.position,
					token: token.render(),
					width: value,
				});
			}
			SizeSpec::Fixed(i32::try_from(value).map_err(|_| invalid())?)
		};

		if let SizeSpec::Fixed(value) = spec {
			match kind {
				FieldKind::Bit if !(1..=8).contains(&value) => {
					return Err(LayoutError::BitWidthOutOfRange {
						at: token.position,
						token: token.render(),
						width: i64::from(value),
					});
				}
				FieldKind::Align if value < 1 => return Err(invalid()),
				FieldKind::Skip if value < 0 => return Err(invalid()),
				_ => {}
			}
		}
		Ok(spec)
	}

	fn array_spec(&mut self, token: &Token) -> Result<Option<SizeSpec>> {
		let Some(text) = token.array_size.as_deref() else {
			return Ok(None);
		};

		let rendered = token.render();
		let spec = {
			let resolve = |name: &str| self.resolve_size_source(token, &rendered, name);
			EvaluatorFactory {
				at: token.position,
				token: &rendered,
				resolve: &resolve,
			}
			.array_size(text)?
		};

		if spec == SizeSpec::WholeStream {
			if self.whole_stream_depth.is_some() {
				return Err(LayoutError::WholeStreamAlreadyDefined {
					at: token.position,
					token: rendered,
				});
			}
			self.whole_stream_depth = Some(self.open.len());
		}
		Ok(Some(spec))
	}

	/// Index of the named field `name` refers to, checked for use as a size source.
	fn resolve_size_source(&self, token: &Token, rendered: &str, name: &str) -> Result<Option<usize>> {
		let wanted = name.to_ascii_lowercase();
		let Some(index) = self.named.iter().rposition(|info| *info.path == *wanted) else {
			return Ok(None);
		};

		let meta = &self.meta[index];
		let path = self.named[index].path.to_string();
		if !meta.kind.is_numeric() {
			return Err(LayoutError::NonNumericSizeSource {
				at: token.position,
				token: rendered.to_owned(),
				field: path,
			});
		}

		let closed_scope = meta
			.array_scopes
			.iter()
			.any(|scope| !self.open.iter().any(|frame| frame.array_scope == Some(*scope)));
		if meta.is_array || closed_scope {
			return Err(LayoutError::ArraySizeSource {
				at: token.position,
				token: rendered.to_owned(),
				field: path,
			});
		}
		Ok(Some(index))
	}

	fn register(&mut self, token: &Token, name: &str, offset: usize, kind: FieldKind, is_array: bool) -> Result<()> {
		let scope_from = self.open.last().map_or(0, |frame| frame.named_from);
		if self.named[scope_from..].iter().any(|info| *info.path == *name) {
			return Err(LayoutError::DuplicateName {
				at: token.position,
				token: token.render(),
				path: name.to_owned(),
			});
		}

		self.named.push(NamedFieldInfo::new(name, offset));
		self.meta.push(NamedMeta {
			kind,
			is_array,
			array_scopes: self.open.iter().filter_map(|frame| frame.array_scope).collect(),
		});
		Ok(())
	}

	fn emit(&mut self, kind: FieldKind, mut flags: u8, custom_index: Option<usize>, extra: Option<SizeSpec>, array: Option<&SizeSpec>) {
		flags |= match array {
			None => 0,
			Some(SizeSpec::Fixed(_)) => FLAG_ARRAY,
			Some(SizeSpec::WholeStream) => FLAG_EXPR_OR_WHOLE_STREAM,
			Some(SizeSpec::Evaluated(_)) => FLAG_ARRAY | FLAG_EXPR_OR_WHOLE_STREAM,
		};
		self.code.push(kind as u8 | flags);

		if let Some(index) = custom_index {
			write_packed(&mut self.code, index as i32);
		}

		match extra {
			Some(SizeSpec::Fixed(value)) => write_packed(&mut self.code, value),
			Some(SizeSpec::Evaluated(evaluator)) => {
				write_packed_evaluated(&mut self.code);
				self.evaluators.push(evaluator);
			}
			Some(SizeSpec::WholeStream) | None => {}
		}

		match array {
			Some(SizeSpec::Fixed(len)) => write_packed(&mut self.code, *len),
			Some(SizeSpec::Evaluated(evaluator)) => self.evaluators.push(evaluator.clone()),
			Some(SizeSpec::WholeStream) | None => {}
		}
	}

	fn is_custom_type(&self, type_name: &str) -> bool {
		self.custom
			.is_some_and(|processor| processor.type_names().iter().any(|name| name.eq_ignore_ascii_case(type_name)))
	}

	fn finish(self, script: &str) -> Result<CompiledBlock> {
		if let Some(frame) = self.open.last() {
			return Err(LayoutError::UnclosedStruct {
				at: frame.at,
				token: frame.token.clone(),
			});
		}

		Ok(CompiledBlock {
			source: script.to_owned(),
			code: self.code,
			named_fields: self.named,
			evaluators: self.evaluators,
			custom_types: self.custom_types,
		})
	}
}

#[cfg(test)]
mod tests;
