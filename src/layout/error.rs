use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Coarse error family, used by callers that only care about the failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
	/// Malformed script text.
	Lexical,
	/// Script is well-formed text but violates a layout rule.
	Compilation,
	/// Size expression could not be compiled or evaluated.
	Expression,
	/// Compiled layout could not be applied to the input.
	RuntimeParsing,
	/// Parse needed a collaborator that was not supplied.
	Configuration,
	/// Field tree lookup failure.
	Lookup,
	/// Underlying IO failure.
	Io,
}

/// Errors produced while compiling layout scripts and parsing binary input.
#[derive(Debug, Error)]
pub enum LayoutError {
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Script text could not be split into tokens.
	#[error("lexical error at {at}: {reason} ({text:?})")]
	Lexical {
		/// Byte offset in the script.
		at: usize,
		/// Offending text.
		text: String,
		/// Short description of the problem.
		reason: &'static str,
	},
	/// Field type is neither a keyword nor a registered custom type.
	#[error("unknown type {type_name:?} at {at} ({token:?})")]
	UnknownType {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Type name as written.
		type_name: String,
	},
	/// Two fields share a path within one structure.
	#[error("duplicated field name {path:?} at {at} ({token:?})")]
	DuplicateName {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Normalized path that already exists in scope.
		path: String,
	},
	/// `align`, `skip` or `reset$$` declared with a name or an array size.
	#[error("{reason} at {at} ({token:?})")]
	ModifierMisuse {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Which rule was broken.
		reason: &'static str,
	},
	/// Extra data does not fit the field type.
	#[error("invalid extra data {extra:?} at {at} ({token:?})")]
	InvalidExtraData {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Extra data as written.
		extra: String,
	},
	/// Bit field width outside `1..=8`.
	#[error("bit width {width} out of range 1..=8 at {at} ({token:?})")]
	BitWidthOutOfRange {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Declared width.
		width: i64,
	},
	/// Size reference names no declared field.
	#[error("unknown size field {name:?} at {at} ({token:?})")]
	UnknownSizeField {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Referenced name.
		name: String,
	},
	/// Size reference points at an array or a field nested in one.
	#[error("array field {field:?} can't be used as size source at {at} ({token:?})")]
	ArraySizeSource {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Path of the referenced field.
		field: String,
	},
	/// Size reference points at a field without a numeric value.
	#[error("field {field:?} is not numeric at {at} ({token:?})")]
	NonNumericSizeSource {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Path of the referenced field.
		field: String,
	},
	/// Second whole-stream array in one script.
	#[error("only one whole-stream array is allowed, second one at {at} ({token:?})")]
	WholeStreamAlreadyDefined {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
	},
	/// Field declared after a whole-stream array.
	#[error("field after whole-stream array at {at} ({token:?})")]
	FieldAfterWholeStream {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
	},
	/// `}` without an open structure.
	#[error("structure close without open at {at}")]
	UnmatchedStructEnd {
		/// Byte offset of the token.
		at: usize,
	},
	/// Script ended with open structures.
	#[error("structure opened at {at} is not closed ({token:?})")]
	UnclosedStruct {
		/// Byte offset of the opening token.
		at: usize,
		/// Reconstructed opening token text.
		token: String,
	},
	/// Custom type processor refused a declaration.
	#[error("custom type {type_name:?} rejected at {at} ({token:?})")]
	CustomTypeRejected {
		/// Byte offset of the token.
		at: usize,
		/// Reconstructed token text.
		token: String,
		/// Custom type name.
		type_name: String,
	},
	/// Size expression contains no tokens.
	#[error("empty expression")]
	ExprEmpty,
	/// Parentheses do not pair up.
	#[error("unmatched bracket at {pos} in {expr:?}")]
	ExprUnmatchedBracket {
		/// Expression text.
		expr: String,
		/// Offset inside the expression.
		pos: usize,
	},
	/// Operator or operand in an illegal position.
	#[error("malformed expression {expr:?} at {pos}: {reason}")]
	ExprMalformed {
		/// Expression text.
		expr: String,
		/// Offset inside the expression.
		pos: usize,
		/// Short description of the problem.
		reason: &'static str,
	},
	/// Identifier is neither a declared field nor external.
	#[error("unknown identifier {name:?} in {expr:?}")]
	ExprUnknownIdentifier {
		/// Expression text.
		expr: String,
		/// Identifier as written.
		name: String,
	},
	/// Numeric literal does not fit in `i32`.
	#[error("literal {literal:?} out of i32 range in {expr:?}")]
	ExprLiteralOutOfRange {
		/// Expression text.
		expr: String,
		/// Literal text.
		literal: String,
	},
	/// Evaluation stack exceeded its fixed depth.
	#[error("expression stack overflow (max={depth})")]
	ExprStackOverflow {
		/// Stack depth limit.
		depth: usize,
	},
	/// Program did not reduce to exactly one value.
	#[error("malformed expression program, {left} values left on stack")]
	ExprMalformedProgram {
		/// Stack depth after execution.
		left: usize,
	},
	/// Division or remainder by zero.
	#[error("division by zero in expression")]
	ExprDivisionByZero,
	/// Input ended before a read completed.
	#[error("unexpected eof at byte {at}, need {need_bits} bits")]
	UnexpectedEof {
		/// Stream byte counter at the failing read.
		at: u64,
		/// Bits requested by the read.
		need_bits: u32,
	},
	/// Computed array size is negative.
	#[error("negative array length {len} for instruction at {at}")]
	NegativeArrayLength {
		/// Bytecode offset of the instruction.
		at: usize,
		/// Computed length.
		len: i32,
	},
	/// Computed extra value is negative.
	#[error("negative extra value {value} for instruction at {at}")]
	NegativeExtraValue {
		/// Bytecode offset of the instruction.
		at: usize,
		/// Computed value.
		value: i32,
	},
	/// Computed bit width outside `1..=8`.
	#[error("computed bit width {width} out of range 1..=8 at {at}")]
	InvalidBitWidth {
		/// Bytecode offset of the instruction.
		at: usize,
		/// Computed width.
		width: i32,
	},
	/// Array length exceeded configured limit.
	#[error("array too large: count={count}, max={max}")]
	ArrayTooLarge {
		/// Requested array length.
		count: usize,
		/// Maximum permitted array length.
		max: usize,
	},
	/// Structure recursion exceeded configured limit.
	#[error("structure depth exceeded (max={max_depth})")]
	DepthExceeded {
		/// Configured depth ceiling.
		max_depth: u32,
	},
	/// Bytecode does not decode.
	#[error("corrupt bytecode at {at}")]
	CorruptBytecode {
		/// Bytecode offset.
		at: usize,
	},
	/// Referenced field has no value in the runtime map.
	#[error("no value read for field {path:?}")]
	MissingFieldValue {
		/// Field path.
		path: String,
	},
	/// External identifier has no provided value.
	#[error("no external value provided for {name:?}")]
	ExternalProviderMissing {
		/// Identifier as written, without `$`.
		name: String,
	},
	/// `var` field met without a processor.
	#[error("var field at {at} needs a var field processor")]
	VarProcessorMissing {
		/// Bytecode offset of the instruction.
		at: usize,
	},
	/// Custom type met without a processor.
	#[error("custom type {type_name:?} at {at} needs a custom type processor")]
	CustomProcessorMissing {
		/// Bytecode offset of the instruction.
		at: usize,
		/// Custom type name.
		type_name: String,
	},
	/// Decompression output exceeded configured safety limit.
	#[error("decompressed output exceeded limit {limit} bytes")]
	DecompressedTooLarge {
		/// Maximum allowed output bytes.
		limit: usize,
	},
	/// Requested field is absent from the tree.
	#[error("field not found: {path}")]
	FieldNotFound {
		/// Requested path, name or type.
		path: String,
	},
	/// More than one field matched an "exactly one" lookup.
	#[error("{count} fields of type {field_type} found, expected at most one")]
	AmbiguousField {
		/// Requested field type label.
		field_type: &'static str,
		/// Number of matches.
		count: usize,
	},
	/// Path expression syntax is invalid.
	#[error("invalid field path: {path}")]
	InvalidFieldPath {
		/// Original user-provided path string.
		path: String,
	},
}

impl LayoutError {
	/// Family of this error.
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::Io(_) => ErrorCategory::Io,
			Self::Lexical { .. } => ErrorCategory::Lexical,
			Self::UnknownType { .. }
			| Self::DuplicateName { .. }
			| Self::ModifierMisuse { .. }
			| Self::InvalidExtraData { .. }
			| Self::BitWidthOutOfRange { .. }
			| Self::UnknownSizeField { .. }
			| Self::ArraySizeSource { .. }
			| Self::NonNumericSizeSource { .. }
			| Self::WholeStreamAlreadyDefined { .. }
			| Self::FieldAfterWholeStream { .. }
			| Self::UnmatchedStructEnd { .. }
			| Self::UnclosedStruct { .. }
			| Self::CustomTypeRejected { .. } => ErrorCategory::Compilation,
			Self::ExprEmpty
			| Self::ExprUnmatchedBracket { .. }
			| Self::ExprMalformed { .. }
			| Self::ExprUnknownIdentifier { .. }
			| Self::ExprLiteralOutOfRange { .. }
			| Self::ExprStackOverflow { .. }
			| Self::ExprMalformedProgram { .. }
			| Self::ExprDivisionByZero => ErrorCategory::Expression,
			Self::UnexpectedEof { .. }
			| Self::NegativeArrayLength { .. }
			| Self::NegativeExtraValue { .. }
			| Self::InvalidBitWidth { .. }
			| Self::ArrayTooLarge { .. }
			| Self::DepthExceeded { .. }
			| Self::CorruptBytecode { .. }
			| Self::MissingFieldValue { .. }
			| Self::DecompressedTooLarge { .. } => ErrorCategory::RuntimeParsing,
			Self::ExternalProviderMissing { .. } | Self::VarProcessorMissing { .. } | Self::CustomProcessorMissing { .. } => ErrorCategory::Configuration,
			Self::FieldNotFound { .. } | Self::AmbiguousField { .. } | Self::InvalidFieldPath { .. } => ErrorCategory::Lookup,
		}
	}

	/// Whether this error reports premature end of input.
	pub fn is_eof(&self) -> bool {
		matches!(self, Self::UnexpectedEof { .. })
	}
}
