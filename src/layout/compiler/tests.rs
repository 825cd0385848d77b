use crate::layout::{
	BitSource, CompilerOptions, CustomTypeProcessor, ErrorCategory, Evaluator, FieldContext, LayoutError, NamedNumericFieldMap, Result, TypeParams, Value, compile,
	compile_with,
};

struct PointType;

impl CustomTypeProcessor for PointType {
	fn type_names(&self) -> &[&str] {
		&["point"]
	}

	fn is_allowed(&self, _params: &TypeParams, _field_name: Option<&str>, _extra: Option<i32>, is_array: bool) -> bool {
		!is_array
	}

	fn read_custom_field(
		&self,
		_source: &mut dyn BitSource,
		_params: &TypeParams,
		_field: &FieldContext<'_>,
		_values: &NamedNumericFieldMap<'_>,
	) -> Result<Value> {
		Ok(Value::Int(0))
	}
}

fn paths(script: &str) -> Vec<String> {
	let block = compile(script).expect("script compiles");
	block.named_fields().iter().map(|info| info.path.to_string()).collect()
}

fn compile_err(script: &str) -> LayoutError {
	compile(script).expect_err("script must be rejected")
}

#[test]
fn scalar_and_array_opcodes() {
	let block = compile("ubyte len; byte[len] data; int [3] fixed; <short s; ubyte [_] rest;").expect("compiles");
	assert_eq!(block.code(), &[0x14, 0x75, 0x38, 0x03, 0x97, 0x54]);
	assert_eq!(block.evaluators().len(), 1);
	assert!(matches!(block.evaluators()[0], Evaluator::Field { index: 0, .. }));
}

#[test]
fn structures_emit_back_reference_and_prefix_paths() {
	let block = compile("bit a; Outer { bit:3 b; inner { int c; } }").expect("compiles");
	assert_eq!(block.code(), &[0x12, 0x01, 0x1A, 0x12, 0x03, 0x1A, 0x18, 0x0B, 0x05, 0x0B, 0x02]);
	let names: Vec<&str> = block.named_fields().iter().map(|info| &*info.path).collect();
	assert_eq!(names, vec!["a", "outer", "outer.b", "outer.inner", "outer.inner.c"]);
	assert_eq!(&*block.named_fields()[4].name, "c");
	assert_eq!(block.named_fields()[4].offset, 6);
}

#[test]
fn anonymous_structures_do_not_prefix() {
	assert_eq!(paths("{ ubyte a; } ubyte b;"), vec!["a", "b"]);
}

#[test]
fn same_name_in_different_structures_is_allowed() {
	assert_eq!(paths("s { int a; } int a;"), vec!["s", "s.a", "a"]);
	assert!(matches!(compile_err("int a; int A;"), LayoutError::DuplicateName { .. }));
	assert!(matches!(compile_err("s { int a; bool a; }"), LayoutError::DuplicateName { .. }));
}

#[test]
fn size_sources_are_checked() {
	assert!(matches!(compile_err("int[n] a;"), LayoutError::UnknownSizeField { .. }));
	assert!(matches!(compile_err("int[2] n; byte[n] a;"), LayoutError::ArraySizeSource { .. }));
	assert!(matches!(compile_err("arr [2] { ubyte n; } byte[arr.n] x;"), LayoutError::ArraySizeSource { .. }));
	assert!(matches!(compile_err("arr [2] { ubyte n; } byte[arr.n + 1] x;"), LayoutError::ArraySizeSource { .. }));
	assert!(matches!(compile_err("s { ubyte n; } byte[s] x;"), LayoutError::NonNumericSizeSource { .. }));
	assert!(matches!(compile_err("ubyte n; byte[n * m] x;"), LayoutError::ExprUnknownIdentifier { .. }));

	compile("arr [2] { ubyte n; byte[n] x; }").expect("size source inside the same array element");
	compile("hdr { ubyte n; } byte[hdr.n] x;").expect("qualified path");
	compile("hdr { ubyte n; } body { byte[hdr.n] x; }").expect("qualified path from sibling");
}

#[test]
fn innermost_declaration_wins() {
	let block = compile("ubyte n; s { ubyte n; byte[n] x; }").expect("compiles");
	assert!(matches!(block.evaluators()[0], Evaluator::Field { index: 2, .. }));
}

#[test]
fn whole_stream_array_must_be_last() {
	compile("hdr { ubyte n; } rec [_] { ubyte a; bit:4 [2] b; }").expect("whole-stream structure at end");
	assert!(matches!(compile_err("byte[_] a; int b;"), LayoutError::FieldAfterWholeStream { .. }));
	assert!(matches!(compile_err("s { byte[_] a; } int b;"), LayoutError::FieldAfterWholeStream { .. }));
	assert!(matches!(compile_err("s [_] { byte[_] a; }"), LayoutError::WholeStreamAlreadyDefined { .. }));
}

#[test]
fn structure_balance() {
	assert!(matches!(compile_err("int a; }"), LayoutError::UnmatchedStructEnd { at: 7 }));
	assert!(matches!(compile_err("s { t { int a; }"), LayoutError::UnclosedStruct { at: 0, .. }));
}

#[test]
fn modifiers_and_extras() {
	compile("align; align:4; skip; skip:(2*2); reset$$; bit:(3) a;").expect("valid modifiers");
	for script in ["align a;", "skip [2];", "reset$$ r;"] {
		assert!(matches!(compile_err(script), LayoutError::ModifierMisuse { .. }), "{script:?}");
	}
	for script in ["int:2 a;", "reset$$:1;", "align:0;", "skip:-1;", "bool:(1) b;"] {
		assert!(matches!(compile_err(script), LayoutError::InvalidExtraData { .. }), "{script:?}");
	}
	assert!(matches!(compile_err("bit:9 a;"), LayoutError::BitWidthOutOfRange { width: 9, .. }));
	assert!(matches!(compile_err("bit:0 a;"), LayoutError::BitWidthOutOfRange { width: 0, .. }));
	assert!(matches!(compile_err("bit:(4+5) a;"), LayoutError::BitWidthOutOfRange { .. }));
	assert!(matches!(compile_err("float f;"), LayoutError::UnknownType { .. }));
}

#[test]
fn extra_evaluator_precedes_array_evaluator() {
	let block = compile("ubyte n; bit:(n) [n] x;").expect("compiles");
	assert_eq!(block.code()[1], 0x72);
	assert_eq!(block.code()[2], 0x82);
	assert!(matches!(block.evaluators()[0], Evaluator::Expression(_)));
	assert!(matches!(block.evaluators()[1], Evaluator::Field { .. }));
}

#[test]
fn errors_carry_category() {
	assert_eq!(compile_err("int a").category(), ErrorCategory::Lexical);
	assert_eq!(compile_err("int a; int a;").category(), ErrorCategory::Compilation);
	assert_eq!(compile_err("byte[(1] a;").category(), ErrorCategory::Expression);
}

#[test]
fn custom_types_come_from_processor() {
	let options = CompilerOptions::with_custom_types(&PointType);
	let block = compile_with("Point p; int x;", &options).expect("compiles");
	assert_eq!(block.code(), &[0x1F, 0x00, 0x00, 0x18]);
	assert_eq!(block.custom_types()[0].type_name, "point");

	let err = compile_with("point [2] p;", &options).expect_err("rejected");
	assert!(matches!(err, LayoutError::CustomTypeRejected { .. }));
	assert!(matches!(compile_err("point p;"), LayoutError::UnknownType { .. }));
}

#[test]
fn disassembly_lists_every_instruction() {
	let block = compile("ubyte len; s [len] { <int v; }").expect("compiles");
	let text = block.disassemble().expect("disassembles");
	let lines: Vec<&str> = text.lines().collect();
	assert_eq!(lines, vec!["0000  ubyte len", "0001  struct [len] s", "0002    <int s.v", "0003  end -> 0001"]);
}
