#![allow(missing_docs)]

use clap::{Parser, Subcommand};

mod cmd;

#[derive(Parser)]
#[command(name = "bitlayout", about = "Compile binary layout scripts and apply them to data files")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print the bytecode and side tables of a script.
	Compile(cmd::compile::Args),
	/// Parse a data file with a script and print the field tree.
	Parse(cmd::parse::Args),
}

fn main() {
	env_logger::init();

	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> bitlayout::layout::Result<()> {
	let cli = Cli::parse();

	match cli.command {
		Commands::Compile(args) => cmd::compile::run(args),
		Commands::Parse(args) => cmd::parse::run(args),
	}
}
