//! Size-expression compiler and stack machine.
//!
//! Expressions compile in one shunting-yard pass into a postfix program. The
//! program runs on a fixed 16-slot stack with wrapping `i32` arithmetic: overflow
//! never errors, so `2147483647 + 1` evaluates to `-2147483648`.

use std::fmt;

use crate::layout::{CompiledBlock, LayoutError, NamedNumericFieldMap, Result};

/// Evaluation stack depth.
pub const STACK_DEPTH: usize = 16;

/// One postfix instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprOp {
	/// Push a literal.
	Const(i32),
	/// Push the value of a named field (index into the named-field table).
	Field(usize),
	/// Push a value from the external provider.
	External(Box<str>),
	/// Push the stream byte counter.
	StreamOffset,
	/// Unary `+`.
	Plus,
	/// Unary `-`.
	Neg,
	/// Unary `~`.
	Not,
	/// Binary `+`.
	Add,
	/// Binary `-`.
	Sub,
	/// Binary `*`.
	Mul,
	/// Binary `/`.
	Div,
	/// Binary `%`.
	Rem,
	/// Binary `|`.
	Or,
	/// Binary `&`.
	And,
	/// Binary `^`.
	Xor,
}

impl ExprOp {
	fn priority(&self) -> u8 {
		match self {
			Self::Plus | Self::Neg | Self::Not => 4,
			Self::Mul | Self::Div | Self::Rem => 3,
			Self::Add | Self::Sub => 2,
			Self::Or | Self::And | Self::Xor => 1,
			Self::Const(_) | Self::Field(_) | Self::External(_) | Self::StreamOffset => 0,
		}
	}

	fn symbol(&self) -> &'static str {
		match self {
			Self::Plus => "u+",
			Self::Neg => "u-",
			Self::Not => "~",
			Self::Add => "+",
			Self::Sub => "-",
			Self::Mul => "*",
			Self::Div => "/",
			Self::Rem => "%",
			Self::Or => "|",
			Self::And => "&",
			Self::Xor => "^",
			Self::Const(_) | Self::Field(_) | Self::External(_) | Self::StreamOffset => "",
		}
	}
}

enum Pending {
	Op(ExprOp),
	Open(usize),
}

/// Compiled size expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprProgram {
	source: Box<str>,
	ops: Vec<ExprOp>,
}

impl ExprProgram {
	/// Compile `expr`, resolving field identifiers through `resolve`.
	///
	/// `resolve` returns `Ok(None)` for unknown names and an error when a known
	/// field is not usable as a size source.
	pub fn compile(expr: &str, resolve: &dyn Fn(&str) -> Result<Option<usize>>) -> Result<Self> {
		let malformed = |pos: usize, reason: &'static str| LayoutError::ExprMalformed {
			expr: expr.to_owned(),
			pos,
			reason,
		};

		let bytes = expr.as_bytes();
		let mut ops = Vec::new();
		let mut pending: Vec<Pending> = Vec::new();
		let mut expect_operand = true;
		let mut seen_any = false;
		let mut pos = 0;

		while pos < bytes.len() {
			let byte = bytes[pos];
			if byte.is_ascii_whitespace() {
				pos += 1;
				continue;
			}
			seen_any = true;
			let start = pos;

			if byte.is_ascii_digit() {
				while pos < bytes.len() && bytes[pos].is_ascii_alphanumeric() {
					pos += 1;
				}
				if !expect_operand {
					return Err(malformed(start, "missing operator between operands"));
				}
				let literal = &expr[start..pos];
				if !literal.bytes().all(|b| b.is_ascii_digit()) {
					return Err(malformed(start, "invalid number"));
				}
				let value = literal.parse::<i32>().map_err(|_| LayoutError::ExprLiteralOutOfRange {
					expr: expr.to_owned(),
					literal: literal.to_owned(),
				})?;
				ops.push(ExprOp::Const(value));
				expect_operand = false;
				continue;
			}

			if byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$' {
				while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || matches!(bytes[pos], b'_' | b'.' | b'$')) {
					pos += 1;
				}
				if !expect_operand {
					return Err(malformed(start, "missing operator between operands"));
				}
				ops.push(operand_for(expr, &expr[start..pos], resolve)?);
				expect_operand = false;
				continue;
			}

			pos += 1;
			match byte {
				b'(' => {
					if !expect_operand {
						return Err(malformed(start, "missing operator before bracket"));
					}
					pending.push(Pending::Open(start));
				}
				b')' => {
					if expect_operand {
						return Err(malformed(start, "missing operand before closing bracket"));
					}
					loop {
						match pending.pop() {
							Some(Pending::Op(op)) => ops.push(op),
							Some(Pending::Open(_)) => break,
							None => {
								return Err(LayoutError::ExprUnmatchedBracket {
									expr: expr.to_owned(),
									pos: start,
								});
							}
						}
					}
				}
				b'+' | b'-' | b'~' if expect_operand => {
					let op = match byte {
						b'+' => ExprOp::Plus,
						b'-' => ExprOp::Neg,
						_ => ExprOp::Not,
					};
					pending.push(Pending::Op(op));
				}
				b'+' | b'-' | b'*' | b'/' | b'%' | b'|' | b'&' | b'^' => {
					if expect_operand {
						return Err(malformed(start, "binary operator without left operand"));
					}
					let op = match byte {
						b'+' => ExprOp::Add,
						b'-' => ExprOp::Sub,
						b'*' => ExprOp::Mul,
						b'/' => ExprOp::Div,
						b'%' => ExprOp::Rem,
						b'|' => ExprOp::Or,
						b'&' => ExprOp::And,
						_ => ExprOp::Xor,
					};
					while let Some(Pending::Op(top)) = pending.last() {
						if top.priority() < op.priority() {
							break;
						}
						if let Some(Pending::Op(top)) = pending.pop() {
							ops.push(top);
						}
					}
					pending.push(Pending::Op(op));
					expect_operand = true;
				}
				b'~' => return Err(malformed(start, "unary operator after operand")),
				_ => return Err(malformed(start, "unexpected character")),
			}
		}

		if !seen_any {
			return Err(LayoutError::ExprEmpty);
		}
		if expect_operand {
			return Err(malformed(expr.len(), "expression ends without operand"));
		}

		while let Some(item) = pending.pop() {
			match item {
				Pending::Op(op) => ops.push(op),
				Pending::Open(pos) => {
					return Err(LayoutError::ExprUnmatchedBracket {
						expr: expr.to_owned(),
						pos,
					});
				}
			}
		}

		Ok(Self {
			source: expr.into(),
			ops,
		})
	}

	/// Build a program from raw instructions.
	pub fn from_ops(source: &str, ops: Vec<ExprOp>) -> Self {
		Self { source: source.into(), ops }
	}

	/// Expression text as written.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Postfix instructions.
	pub fn ops(&self) -> &[ExprOp] {
		&self.ops
	}

	/// Value of the program when it reads no fields, externals or stream offset.
	pub fn as_constant(&self) -> Option<i32> {
		let pure = self
			.ops
			.iter()
			.all(|op| !matches!(op, ExprOp::Field(_) | ExprOp::External(_) | ExprOp::StreamOffset));
		if !pure {
			return None;
		}
		self.evaluate(0, &CompiledBlock::default(), &NamedNumericFieldMap::new()).ok()
	}

	/// Run the program.
	pub fn evaluate(&self, stream_offset: u64, block: &CompiledBlock, values: &NamedNumericFieldMap<'_>) -> Result<i32> {
		let mut stack = [0_i32; STACK_DEPTH];
		let mut depth = 0_usize;

		for op in &self.ops {
			let pushed = match op {
				ExprOp::Const(value) => *value,
				ExprOp::Field(index) => values.value_at(block, *index)?,
				ExprOp::External(name) => values.external_value(name, block)?,
				ExprOp::StreamOffset => stream_offset as i32,
				ExprOp::Plus | ExprOp::Neg | ExprOp::Not => {
					let value = pop(&mut stack, &mut depth)?;
					match op {
						ExprOp::Neg => value.wrapping_neg(),
						ExprOp::Not => !value,
						_ => value,
					}
				}
				_ => {
					let right = pop(&mut stack, &mut depth)?;
					let left = pop(&mut stack, &mut depth)?;
					binary(op, left, right)?
				}
			};

			if depth == STACK_DEPTH {
				return Err(LayoutError::ExprStackOverflow { depth: STACK_DEPTH });
			}
			stack[depth] = pushed;
			depth += 1;
		}

		if depth != 1 {
			return Err(LayoutError::ExprMalformedProgram { left: depth });
		}
		Ok(stack[0])
	}
}

impl fmt::Display for ExprProgram {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (idx, op) in self.ops.iter().enumerate() {
			if idx > 0 {
				f.write_str(" ")?;
			}
			match op {
				ExprOp::Const(value) => write!(f, "{value}")?,
				ExprOp::Field(index) => write!(f, "#{index}")?,
				ExprOp::External(name) => write!(f, "${name}")?,
				ExprOp::StreamOffset => f.write_str("$$")?,
				other => f.write_str(other.symbol())?,
			}
		}
		Ok(())
	}
}

fn operand_for(expr: &str, ident: &str, resolve: &dyn Fn(&str) -> Result<Option<usize>>) -> Result<ExprOp> {
	if let Some(name) = ident.strip_prefix('$') {
		if name.is_empty() || name == "$" {
			return Ok(ExprOp::StreamOffset);
		}
		return Ok(ExprOp::External(name.into()));
	}

	match resolve(ident)? {
		Some(index) => Ok(ExprOp::Field(index)),
		None => Err(LayoutError::ExprUnknownIdentifier {
			expr: expr.to_owned(),
			name: ident.to_owned(),
		}),
	}
}

fn pop(stack: &mut [i32; STACK_DEPTH], depth: &mut usize) -> Result<i32> {
	if *depth == 0 {
		return Err(LayoutError::ExprMalformedProgram { left: 0 });
	}
	*depth -= 1;
	Ok(stack[*depth])
}

fn binary(op: &ExprOp, left: i32, right: i32) -> Result<i32> {
	Ok(match op {
		ExprOp::Add => left.wrapping_add(right),
		ExprOp::Sub => left.wrapping_sub(right),
		ExprOp::Mul => left.wrapping_mul(right),
		ExprOp::Div | ExprOp::Rem if right == 0 => return Err(LayoutError::ExprDivisionByZero),
		ExprOp::Div => left.wrapping_div(right),
		ExprOp::Rem => left.wrapping_rem(right),
		ExprOp::Or => left | right,
		ExprOp::And => left & right,
		ExprOp::Xor => left ^ right,
		_ => return Err(LayoutError::ExprMalformedProgram { left: 2 }),
	})
}
