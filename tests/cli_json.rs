#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

#[test]
fn compile_json_lists_tables() {
	let json = run_json(&["compile", &fixture("sprite.layout"), "--json"]);

	let paths: Vec<&str> = json["named_fields"]
		.as_array()
		.expect("named_fields array")
		.iter()
		.filter_map(|item| item["path"].as_str())
		.collect();
	assert_eq!(
		paths,
		vec![
			"magic",
			"version",
			"header",
			"header.width",
			"header.height",
			"header.bpp",
			"header.flags",
			"frame_count",
			"frames",
			"frames.duration",
			"frames.mask",
			"trailer"
		]
	);
	assert_eq!(json["evaluators"], serde_json::json!(["frame_count", "header.width * header.height / 8"]));
	assert!(json["code"].as_str().is_some_and(|code| code.len() == 2 * json["code_len"].as_u64().unwrap_or_default() as usize));
	assert!(json["instructions"].as_array().is_some_and(|items| items.len() == 14));
}

#[test]
fn parse_json_decodes_fixture() {
	let json = run_json(&["parse", &fixture("sprite.layout"), &fixture("sprite.bin"), "--json"]);

	assert_eq!(json["encoding"], "raw");
	assert_eq!(json["input_bytes"], 17);
	let value = &json["value"];
	assert_eq!(value["magic"], 0x5053);
	assert_eq!(value["header"]["bpp"], 8);
	assert_eq!(value["header"]["flags"], 2);
	assert_eq!(value["frames"][1]["duration"], 200);
	assert_eq!(value["frames"][0]["mask"], serde_json::json!([170, 85]));
	assert_eq!(value["trailer"], serde_json::json!([222, 173]));
}

#[test]
fn parse_json_honors_bit_order_and_path() {
	let json = run_json(&["parse", &fixture("sprite.layout"), &fixture("sprite.bin"), "--msb0", "--path", "header.bpp", "--json"]);
	assert_eq!(json["bit_order"], "msb0");
	assert_eq!(json["path"], "header.bpp");
	assert_eq!(json["value"], 2);

	let json = run_json(&["parse", &fixture("sprite.layout"), &fixture("sprite.bin"), "--path", "frames[1].mask", "--json"]);
	assert_eq!(json["value"], serde_json::json!([15, 240]));
}

#[test]
fn parse_json_uses_external_values() {
	let json = run_json(&[
		"parse",
		&fixture("records.layout"),
		&fixture("records.bin"),
		"--ext",
		"header_len=2",
		"--json",
	]);
	let value = &json["value"];
	assert_eq!(value["header"], serde_json::json!([171, 205]));
	assert_eq!(value["records"].as_array().map(Vec::len), Some(3));
	assert_eq!(value["records"][1]["body"], serde_json::json!([]));
	assert_eq!(value["records"][2]["body"], serde_json::json!([-1]));
}

#[test]
fn missing_external_value_fails() {
	let output = run(&["parse", &fixture("records.layout"), &fixture("records.bin")]);
	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("header_len"), "unexpected stderr: {stderr}");
}

#[test]
fn truncated_input_needs_tolerate_eof() {
	let data = std::fs::read(fixture_path("sprite.bin")).expect("fixture reads");
	let truncated = temp_file("sprite_truncated.bin", &data[..13]);
	let truncated = truncated.display().to_string();

	let output = run(&["parse", &fixture("sprite.layout"), &truncated]);
	assert!(!output.status.success(), "strict parse should fail on truncated input");

	let json = run_json(&["parse", &fixture("sprite.layout"), &truncated, "--tolerate-eof", "--json"]);
	let value = &json["value"];
	assert_eq!(value["frame_count"], 2);
	assert_eq!(value["frames"].as_array().map(Vec::len), Some(1));
	assert!(value.get("trailer").is_none());
}

#[test]
fn zstd_input_is_decoded() {
	let data = std::fs::read(fixture_path("sprite.bin")).expect("fixture reads");
	let packed = zstd::encode_all(data.as_slice(), 3).expect("zstd encodes");
	let packed = temp_file("sprite.bin.zst", &packed).display().to_string();

	let json = run_json(&["parse", &fixture("sprite.layout"), &packed, "--json"]);
	assert_eq!(json["encoding"], "zstd");
	assert_eq!(json["input_bytes"], 17);
	assert_eq!(json["value"]["frames"][1]["duration"], 200);
}

#[test]
fn compile_errors_exit_nonzero() {
	let script = temp_file("broken.layout", b"byte[_] data; int after;");
	let output = run(&["compile", &script.display().to_string()]);
	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("whole-stream"));
}

fn run(args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_bitlayout")).args(args).output().expect("command executes")
}

fn run_json(args: &[&str]) -> Value {
	let output = run(args);
	assert!(
		output.status.success(),
		"command failed with status={}: {}",
		output.status,
		String::from_utf8_lossy(&output.stderr)
	);
	serde_json::from_slice(&output.stdout).expect("stdout should be valid json")
}

fn fixture_path(name: &str) -> PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn fixture(name: &str) -> String {
	fixture_path(name).display().to_string()
}

fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
	let dir = std::env::temp_dir().join(format!("bitlayout-cli-{}", std::process::id()));
	std::fs::create_dir_all(&dir).expect("temp dir");
	let path = dir.join(name);
	std::fs::write(&path, bytes).expect("temp file writes");
	path
}
