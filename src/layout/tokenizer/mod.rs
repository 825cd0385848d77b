use crate::layout::{LayoutError, Result, Token, TokenKind, TypeParams};

/// Type and modifier keywords that can't be used as field names.
pub const RESERVED_WORDS: &[&str] = &["bit", "bool", "byte", "ubyte", "short", "ushort", "int", "long", "align", "skip", "var", "reset$$"];

/// Forward-only token stream over script text.
///
/// The tokenizer looks one item ahead; an error found while reading ahead is
/// buffered and raised by the next call to `next`, after which the sequence ends.
pub struct Tokenizer<'a> {
	text: &'a str,
	pos: usize,
	custom_types: Vec<String>,
	ahead: Option<Result<Token>>,
	finished: bool,
}

impl<'a> Tokenizer<'a> {
	/// Tokenize `text` with only built-in types reserved.
	pub fn new(text: &'a str) -> Self {
		Self::with_custom_types(text, &[])
	}

	/// Tokenize `text`, also reserving `custom_types` as names.
	pub fn with_custom_types(text: &'a str, custom_types: &[&str]) -> Self {
		let mut tokenizer = Self {
			text,
			pos: 0,
			custom_types: custom_types.iter().map(|name| name.to_ascii_lowercase()).collect(),
			ahead: None,
			finished: false,
		};
		tokenizer.ahead = tokenizer.scan_token();
		tokenizer
	}

	fn scan_token(&mut self) -> Option<Result<Token>> {
		self.skip_whitespace();
		let bytes = self.text.as_bytes();
		if self.pos >= bytes.len() {
			return None;
		}

		let start = self.pos;
		if self.text[start..].starts_with("//") {
			let end = self.text[start..].find('\n').map_or(bytes.len(), |rel| start + rel);
			self.pos = end;
			let body = self.text[start + 2..end].trim_end_matches('\r');
			return Some(Ok(Token {
				kind: TokenKind::Comment,
				position: start,
				type_params: None,
				array_size: None,
				name: Some(body.to_owned()),
			}));
		}

		if bytes[start] == b'}' {
			self.pos += 1;
			return Some(Ok(Token {
				kind: TokenKind::StructEnd,
				position: start,
				type_params: None,
				array_size: None,
				name: None,
			}));
		}

		Some(self.scan_descriptor(start))
	}

	fn scan_descriptor(&mut self, start: usize) -> Result<Token> {
		let type_part = self.scan_type_part(start)?;
		self.skip_whitespace();

		let array_size = self.scan_array_size(start)?;
		self.skip_whitespace();

		let name = self.scan_while(|byte| !byte.is_ascii_whitespace() && !b";[]{}/".contains(&byte));
		self.skip_whitespace();

		let ender = self.text.as_bytes().get(self.pos).copied();
		if !matches!(ender, Some(b'{' | b';')) {
			return Err(self.stray(start));
		}
		self.pos += 1;

		if ender == Some(b'{') {
			if type_part.is_some() && name.is_some() {
				return Err(self.lexical(start, "structure has both type and name"));
			}
			let struct_name = name.or(type_part);
			if let Some(struct_name) = struct_name {
				self.check_name(start, struct_name)?;
			}
			return Ok(Token {
				kind: TokenKind::StructStart,
				position: start,
				type_params: None,
				array_size,
				name: struct_name.map(str::to_owned),
			});
		}

		let Some(type_part) = type_part else {
			return Err(self.lexical(start, "field type is missing"));
		};
		let Some(type_params) = TypeParams::parse(type_part) else {
			return Err(self.lexical(start, "invalid type descriptor"));
		};
		if let Some(name) = name {
			self.check_name(start, name)?;
		}

		Ok(Token {
			kind: TokenKind::Atom,
			position: start,
			type_params: Some(type_params),
			array_size,
			name: name.map(str::to_owned),
		})
	}

	fn scan_type_part(&mut self, start: usize) -> Result<Option<&'a str>> {
		let text = self.text;
		let bytes = text.as_bytes();
		let from = self.pos;
		while let Some(&byte) = bytes.get(self.pos) {
			if byte == b'(' {
				let mut depth = 0_usize;
				while let Some(&inner) = bytes.get(self.pos) {
					match inner {
						b'(' => depth += 1,
						b')' => depth -= 1,
						b';' | b'{' | b'}' | b'[' | b']' => return Err(self.lexical(start, "unclosed parenthesis in type")),
						_ => {}
					}
					self.pos += 1;
					if depth == 0 {
						break;
					}
				}
				if depth != 0 {
					return Err(self.lexical(start, "unclosed parenthesis in type"));
				}
				continue;
			}
			if byte.is_ascii_whitespace() || b";[]{}".contains(&byte) {
				break;
			}
			self.pos += 1;
		}
		Ok((self.pos > from).then(|| &text[from..self.pos]))
	}

	fn scan_array_size(&mut self, start: usize) -> Result<Option<String>> {
		let bytes = self.text.as_bytes();
		if bytes.get(self.pos) != Some(&b'[') {
			return Ok(None);
		}
		let from = self.pos + 1;
		let Some(rel_end) = self.text[from..].find(|c: char| matches!(c, ']' | '[' | '{' | '}' | ';')) else {
			return Err(self.stray(start));
		};
		let end = from + rel_end;
		if bytes[end] != b']' {
			return Err(self.stray(start));
		}
		let size = self.text[from..end].trim();
		if size.is_empty() {
			return Err(self.lexical(start, "empty array size"));
		}
		self.pos = end + 1;
		Ok(Some(size.to_owned()))
	}

	fn check_name(&self, start: usize, name: &str) -> Result<()> {
		let reason = if name.contains('.') {
			Some("field name must not contain '.'")
		} else if name.starts_with('$') {
			Some("field name must not start with '$'")
		} else if RESERVED_WORDS.iter().any(|word| word.eq_ignore_ascii_case(name)) {
			Some("field name is a reserved word")
		} else if self.custom_types.iter().any(|word| word.eq_ignore_ascii_case(name)) {
			Some("field name is a custom type name")
		} else if !is_identifier(name) {
			Some("invalid field name")
		} else {
			None
		};

		match reason {
			Some(reason) => Err(LayoutError::Lexical {
				at: start,
				text: name.to_owned(),
				reason,
			}),
			None => Ok(()),
		}
	}

	fn scan_while(&mut self, keep: impl Fn(u8) -> bool) -> Option<&'a str> {
		let text = self.text;
		let bytes = text.as_bytes();
		let from = self.pos;
		while bytes.get(self.pos).is_some_and(|byte| keep(*byte)) {
			self.pos += 1;
		}
		(self.pos > from).then(|| &text[from..self.pos])
	}

	fn skip_whitespace(&mut self) {
		let _ = self.scan_while(|byte| byte.is_ascii_whitespace());
	}

	fn lexical(&self, start: usize, reason: &'static str) -> LayoutError {
		LayoutError::Lexical {
			at: start,
			text: self.text[start..self.pos.min(self.text.len())].trim().to_owned(),
			reason,
		}
	}

	fn stray(&self, start: usize) -> LayoutError {
		let rest = &self.text[start..];
		let end = rest.find(['\n', ';', '{', '}']).map_or(rest.len(), |idx| idx + 1);
		LayoutError::Lexical {
			at: start,
			text: rest[..end].trim().to_owned(),
			reason: "unexpected text",
		}
	}
}

impl Iterator for Tokenizer<'_> {
	type Item = Result<Token>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}

		match self.ahead.take() {
			Some(Ok(token)) => {
				self.ahead = self.scan_token();
				Some(Ok(token))
			}
			Some(Err(err)) => {
				self.finished = true;
				Some(Err(err))
			}
			None => {
				self.finished = true;
				None
			}
		}
	}
}

fn is_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
