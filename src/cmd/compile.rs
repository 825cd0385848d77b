use std::path::PathBuf;

use bitlayout::layout::Result;

use crate::cmd::util::{compile_script, emit_json, hex};

#[derive(clap::Args)]
pub struct Args {
	pub script: PathBuf,
	#[arg(long)]
	pub json: bool,
}

#[derive(serde::Serialize)]
struct CompileJson {
	script: String,
	code: String,
	code_len: usize,
	instructions: Vec<String>,
	named_fields: Vec<NamedFieldJson>,
	evaluators: Vec<String>,
	custom_types: Vec<String>,
}

#[derive(serde::Serialize)]
struct NamedFieldJson {
	path: String,
	name: String,
	offset: usize,
}

/// Compile a script and print its bytecode, named fields and evaluators.
pub fn run(args: Args) -> Result<()> {
	let Args { script, json } = args;

	let block = compile_script(&script)?;
	let listing = block.disassemble()?;

	if json {
		let payload = CompileJson {
			script: script.display().to_string(),
			code: hex(block.code()),
			code_len: block.code().len(),
			instructions: listing.lines().map(str::to_owned).collect(),
			named_fields: block
				.named_fields()
				.iter()
				.map(|info| NamedFieldJson {
					path: info.path.to_string(),
					name: info.name.to_string(),
					offset: info.offset,
				})
				.collect(),
			evaluators: block.evaluators().iter().map(ToString::to_string).collect(),
			custom_types: block.custom_types().iter().map(ToString::to_string).collect(),
		};
		emit_json(&payload);
		return Ok(());
	}

	println!("script: {}", script.display());
	println!("code: {} bytes", block.code().len());
	print!("{listing}");

	println!("named fields: {}", block.named_fields().len());
	for (idx, info) in block.named_fields().iter().enumerate() {
		println!("  {idx:>3}  {:04x}  {}", info.offset, info.path);
	}

	println!("evaluators: {}", block.evaluators().len());
	for (idx, evaluator) in block.evaluators().iter().enumerate() {
		println!("  {idx:>3}  {evaluator}");
	}
	Ok(())
}
