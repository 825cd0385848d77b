use std::fmt;

use crate::layout::{CompiledBlock, ExprProgram, LayoutError, NamedNumericFieldMap, Result};

/// Runtime source of an array length or extra value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluator {
	/// Compiled arithmetic expression.
	Expression(ExprProgram),
	/// Value of one earlier named field.
	Field {
		/// Index into the named-field table.
		index: usize,
		/// Path as resolved at compile time.
		path: Box<str>,
	},
	/// `$name` answered by the external value provider.
	External {
		/// Identifier without `$`.
		name: Box<str>,
	},
	/// `$$`: the stream byte counter.
	StreamOffset,
}

impl Evaluator {
	/// Compute the value at the current parse position.
	pub fn eval(&self, stream_offset: u64, block: &CompiledBlock, values: &NamedNumericFieldMap<'_>) -> Result<i32> {
		match self {
			Self::Expression(program) => program.evaluate(stream_offset, block, values),
			Self::Field { index, .. } => values.value_at(block, *index),
			Self::External { name } => values.external_value(name, block),
			Self::StreamOffset => Ok(stream_offset as i32),
		}
	}

	/// Whether the evaluator may call the external value provider.
	pub fn uses_external(&self) -> bool {
		match self {
			Self::Expression(program) => program.ops().iter().any(|op| matches!(op, crate::layout::ExprOp::External(_))),
			Self::External { .. } => true,
			Self::Field { .. } | Self::StreamOffset => false,
		}
	}
}

impl fmt::Display for Evaluator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Expression(program) => f.write_str(program.source()),
			Self::Field { path, .. } => f.write_str(path),
			Self::External { name } => write!(f, "${name}"),
			Self::StreamOffset => f.write_str("$$"),
		}
	}
}

/// Classified array size or extra value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
	/// Known at compile time.
	Fixed(i32),
	/// `_`: read until the input is exhausted.
	WholeStream,
	/// Computed at runtime.
	Evaluated(Evaluator),
}

/// Builds evaluators for one token, resolving names against the fields
/// declared so far.
pub(crate) struct EvaluatorFactory<'a> {
	pub at: usize,
	pub token: &'a str,
	pub resolve: &'a dyn Fn(&str) -> Result<Option<usize>>,
}

impl EvaluatorFactory<'_> {
	/// Classify the text inside `[...]`.
	pub fn array_size(&self, text: &str) -> Result<SizeSpec> {
		let text = text.trim();
		if text == "_" {
			return Ok(SizeSpec::WholeStream);
		}
		self.build(text)
	}

	/// Classify extra data, either a literal or `( ... )`.
	pub fn extra(&self, text: &str) -> Result<SizeSpec> {
		self.build(text.trim())
	}

	fn build(&self, text: &str) -> Result<SizeSpec> {
		if is_single_reference(text) {
			return self.single_reference(text);
		}

		let program = ExprProgram::compile(text, self.resolve)?;
		match program.as_constant() {
			Some(value) if value >= 0 => Ok(SizeSpec::Fixed(value)),
			_ => Ok(SizeSpec::Evaluated(Evaluator::Expression(program))),
		}
	}

	fn single_reference(&self, text: &str) -> Result<SizeSpec> {
		if text.bytes().all(|byte| byte.is_ascii_digit()) {
			let value = text.parse::<i32>().map_err(|_| LayoutError::ExprLiteralOutOfRange {
				expr: text.to_owned(),
				literal: text.to_owned(),
			})?;
			return Ok(SizeSpec::Fixed(value));
		}

		if let Some(name) = text.strip_prefix('$') {
			if name.is_empty() || name == "$" {
				return Ok(SizeSpec::Evaluated(Evaluator::StreamOffset));
			}
			return Ok(SizeSpec::Evaluated(Evaluator::External { name: name.into() }));
		}

		match (self.resolve)(text)? {
			Some(index) => Ok(SizeSpec::Evaluated(Evaluator::Field {
				index,
				path: text.to_ascii_lowercase().into(),
			})),
			None => Err(LayoutError::UnknownSizeField {
				at: self.at,
				token: self.token.to_owned(),
				name: text.to_owned(),
			}),
		}
	}
}

fn is_single_reference(text: &str) -> bool {
	!text.is_empty()
		&& !text.bytes().next().is_some_and(|byte| byte.is_ascii_digit() && text.bytes().any(|b| !b.is_ascii_digit()))
		&& text.bytes().all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'$'))
}

#[cfg(test)]
mod tests {
	use super::{Evaluator, EvaluatorFactory, SizeSpec};
	use crate::layout::{CompiledBlock, ErrorCategory, NamedNumericFieldMap, Result};

	static RESOLVE: fn(&str) -> Result<Option<usize>> = resolve;

	fn resolve(name: &str) -> Result<Option<usize>> {
		Ok(name.eq_ignore_ascii_case("len").then_some(0))
	}

	fn factory() -> EvaluatorFactory<'static> {
		EvaluatorFactory {
			at: 0,
			token: "byte[x] a;",
			resolve: &RESOLVE,
		}
	}

	#[test]
	fn single_references_are_classified() {
		let factory = factory();
		assert_eq!(factory.array_size("12").expect("literal"), SizeSpec::Fixed(12));
		assert_eq!(factory.array_size(" _ ").expect("whole"), SizeSpec::WholeStream);
		assert_eq!(factory.array_size("$$").expect("offset"), SizeSpec::Evaluated(Evaluator::StreamOffset));
		assert_eq!(
			factory.array_size("$count").expect("external"),
			SizeSpec::Evaluated(Evaluator::External { name: "count".into() })
		);
		assert_eq!(
			factory.array_size("LEN").expect("field"),
			SizeSpec::Evaluated(Evaluator::Field {
				index: 0,
				path: "len".into()
			})
		);
	}

	#[test]
	fn unknown_single_reference_is_a_compile_error() {
		let err = factory().array_size("nope").expect_err("unknown");
		assert_eq!(err.category(), ErrorCategory::Compilation);
	}

	#[test]
	fn constant_expressions_fold() {
		let factory = factory();
		assert_eq!(factory.extra("(3)").expect("folded"), SizeSpec::Fixed(3));
		assert_eq!(factory.array_size("2*3+1").expect("folded"), SizeSpec::Fixed(7));
		assert!(matches!(factory.array_size("(0-2)").expect("kept"), SizeSpec::Evaluated(Evaluator::Expression(_))));
	}

	#[test]
	fn stream_offset_evaluator_reads_counter() {
		let block = CompiledBlock::default();
		let map = NamedNumericFieldMap::new();
		assert_eq!(Evaluator::StreamOffset.eval(9, &block, &map).expect("offset"), 9);
	}
}
