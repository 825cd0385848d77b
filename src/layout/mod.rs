mod bits;
pub mod bytecode;
mod compiled;
mod compiler;
mod compression;
mod error;
mod evaluator;
mod expr;
mod field_map;
mod parser;
mod path;
mod processor;
mod token;
mod tokenizer;
mod value;

/// Bit-level input and output.
pub use bits::{BitOrder, BitReader, BitSource, BitWriter, Endianness};
/// Decoded bytecode instruction types.
pub use bytecode::{ArrayMode, FieldKind, Instruction, Packed};
/// Compiled layout and its named-field table.
pub use compiled::{CompiledBlock, NamedFieldInfo};
/// Script compiler entry points.
pub use compiler::{CompilerOptions, compile, compile_with};
/// Input loading with zstd detection.
pub use compression::{InputEncoding, MAX_DECOMPRESSED_BYTES, ZSTD_MAGIC, decode_input, decode_input_with_limit, load_input};
/// Error and result aliases.
pub use error::{ErrorCategory, LayoutError, Result};
/// Runtime value sources for sizes and extras.
pub use evaluator::{Evaluator, SizeSpec};
/// Size expression programs.
pub use expr::{ExprOp, ExprProgram, STACK_DEPTH};
/// Per-parse numeric field values and external value providers.
pub use field_map::{ExternalValueProvider, ExternalValues, NamedNumericFieldMap};
/// Bytecode interpreter.
pub use parser::{LayoutParser, ParserOptions};
/// Field path parser types.
pub use path::{FieldPath, PathStep};
/// Caller-supplied readers for `var` and custom-type fields.
pub use processor::{CustomTypeProcessor, ElementCount, FieldContext, VarFieldProcessor};
/// Script tokens.
pub use token::{Token, TokenKind, TypeParams};
/// Script tokenizer.
pub use tokenizer::{RESERVED_WORDS, Tokenizer};
/// Decoded field tree.
pub use value::{FieldType, FieldValue, StructValue, Value};
