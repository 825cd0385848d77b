/// Script compilation and disassembly command.
pub mod compile;
/// Data file parsing command.
pub mod parse;
/// Text rendering of decoded field trees.
pub mod print;
/// Shared CLI helpers.
pub mod util;
