use std::path::PathBuf;

use bitlayout::layout::{BitOrder, ExternalValues, FieldPath, LayoutParser, ParserOptions, Result, load_input};

use crate::cmd::print::{PrintOptions, print_struct, print_value};
use crate::cmd::util::{compile_script, emit_json, parse_ext, struct_to_json, value_to_json};

#[derive(clap::Args)]
pub struct Args {
	pub script: PathBuf,
	pub data: PathBuf,
	#[arg(long)]
	pub msb0: bool,
	#[arg(long = "tolerate-eof")]
	pub tolerate_eof: bool,
	#[arg(long = "ext", value_name = "NAME=VALUE", value_parser = parse_ext)]
	pub externals: Vec<(String, i32)>,
	#[arg(long = "path")]
	pub path_expr: Option<String>,
	#[arg(long = "max-depth")]
	pub max_depth: Option<u32>,
	#[arg(long = "max-array")]
	pub max_array: Option<usize>,
	#[arg(long)]
	pub json: bool,
}

#[derive(serde::Serialize)]
struct ParseJson {
	script: String,
	data: String,
	encoding: String,
	input_bytes: usize,
	bit_order: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	path: Option<String>,
	value: serde_json::Value,
}

/// Apply a script to a data file and print the decoded fields.
pub fn run(args: Args) -> Result<()> {
	let Args {
		script,
		data,
		msb0,
		tolerate_eof,
		externals,
		path_expr,
		max_depth,
		max_array,
		json,
	} = args;

	let block = compile_script(&script)?;
	let (encoding, bytes) = load_input(&data)?;
	let externals: ExternalValues = externals.into_iter().collect();

	let mut options = ParserOptions::default();
	if msb0 {
		options.bit_order = BitOrder::Msb0;
	}
	options.skip_remaining_fields_if_eof = tolerate_eof;
	if let Some(max_depth) = max_depth {
		options.max_depth = max_depth;
	}
	if let Some(max_array) = max_array {
		options.max_array_elems = max_array;
	}

	let root = LayoutParser::new(&block).with_options(options).with_provider(&externals).parse_bytes(&bytes)?;
	let selected = match &path_expr {
		Some(expr) => Some(root.select(&FieldPath::parse(expr)?)?),
		None => None,
	};

	if json {
		let payload = ParseJson {
			script: script.display().to_string(),
			data: data.display().to_string(),
			encoding: encoding.as_str().to_owned(),
			input_bytes: bytes.len(),
			bit_order: options.bit_order.as_str().to_owned(),
			path: path_expr,
			value: match &selected {
				Some(value) => value_to_json(value),
				None => struct_to_json(&root),
			},
		};
		emit_json(&payload);
		return Ok(());
	}

	let print_options = PrintOptions::default();
	match selected {
		Some(value) => print_value(&value, print_options),
		None => {
			println!("data: {} ({}, {} bytes)", data.display(), encoding.as_str(), bytes.len());
			print_struct(&root, 0, 0, print_options);
		}
	}
	Ok(())
}
