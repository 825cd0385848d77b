use std::fmt;

use crate::layout::Endianness;

/// Lexical unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	/// Field declaration ending in `;`.
	Atom,
	/// `//` line comment.
	Comment,
	/// Structure declaration ending in `{`.
	StructStart,
	/// `}`.
	StructEnd,
}

/// Decomposed type substring `[<>]? name (":" extra)?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParams {
	/// Byte order selected by `<` / `>`.
	pub endianness: Endianness,
	/// Lowercased type name.
	pub type_name: String,
	/// Text after `:`, either a decimal integer or `( ... )`.
	pub extra: Option<String>,
}

impl TypeParams {
	/// Parse a type substring, returning `None` when it is malformed.
	pub fn parse(raw: &str) -> Option<Self> {
		let (endianness, rest) = match raw.as_bytes().first() {
			Some(b'<') => (Endianness::Little, &raw[1..]),
			Some(b'>') => (Endianness::Big, &raw[1..]),
			_ => (Endianness::Big, raw),
		};

		let (name, extra) = match rest.split_once(':') {
			Some((name, extra)) => (name, Some(extra)),
			None => (rest, None),
		};

		let mut chars = name.chars();
		let first = chars.next()?;
		if !(first.is_ascii_alphanumeric() || first == '_') {
			return None;
		}
		if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
			return None;
		}

		if let Some(extra) = extra {
			if !is_valid_extra(extra) {
				return None;
			}
		}

		Some(Self {
			endianness,
			type_name: name.to_ascii_lowercase(),
			extra: extra.map(str::to_owned),
		})
	}

	/// Whether extra data is a parenthesized expression.
	pub fn extra_is_expression(&self) -> bool {
		self.extra.as_deref().is_some_and(|extra| extra.starts_with('('))
	}
}

impl fmt::Display for TypeParams {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.endianness == Endianness::Little {
			f.write_str("<")?;
		}
		f.write_str(&self.type_name)?;
		if let Some(extra) = &self.extra {
			write!(f, ":{extra}")?;
		}
		Ok(())
	}
}

fn is_valid_extra(extra: &str) -> bool {
	if extra.starts_with('(') {
		return extra.len() > 2 && extra.ends_with(')');
	}
	let digits = extra.strip_prefix('-').unwrap_or(extra);
	!digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// One token produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	/// Token kind.
	pub kind: TokenKind,
	/// Byte offset of the token start in the script.
	pub position: usize,
	/// Parsed type substring, for atoms.
	pub type_params: Option<TypeParams>,
	/// Raw text inside `[...]`.
	pub array_size: Option<String>,
	/// Field name; comment body for comments.
	pub name: Option<String>,
}

impl Token {
	/// Whether the token declares an array.
	pub fn is_array(&self) -> bool {
		self.array_size.is_some()
	}

	/// Rebuild source-like text for diagnostics.
	pub fn render(&self) -> String {
		match self.kind {
			TokenKind::Comment => format!("//{}", self.name.as_deref().unwrap_or_default()),
			TokenKind::StructEnd => "}".to_owned(),
			TokenKind::Atom | TokenKind::StructStart => {
				let mut out = String::new();
				if let Some(params) = &self.type_params {
					out.push_str(&params.to_string());
				}
				if let Some(size) = &self.array_size {
					out.push('[');
					out.push_str(size);
					out.push(']');
				}
				if let Some(name) = &self.name {
					if !out.is_empty() {
						out.push(' ');
					}
					out.push_str(name);
				}
				out.push_str(if self.kind == TokenKind::Atom { ";" } else { " {" });
				out
			}
		}
	}
}
