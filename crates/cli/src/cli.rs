use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nbexec")]
#[command(about = "Execute jupyter code blocks in markdown documents through a per-document interpreter")]
#[command(version)]
#[command(styles = styles())]
pub struct Cli {
	#[command(flatten)]
	pub globals: GlobalArgs,

	#[command(subcommand)]
	pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Settings file (defaults to <config dir>/nbexec/settings.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Interpreter to launch, overriding settings and frontmatter
	#[arg(long, global = true, value_name = "PATH")]
	pub interpreter: Option<String>,

	/// Companion script run by the interpreter
	#[arg(long, global = true, value_name = "FILE")]
	pub script: Option<PathBuf>,

	/// Working directory for interpreters
	#[arg(long, global = true, value_name = "DIR")]
	pub cwd: Option<PathBuf>,

	/// Give up on a request after this many milliseconds
	#[arg(long, global = true, value_name = "MS")]
	pub timeout_ms: Option<u64>,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Execute the jupyter blocks of a document in order
	Run {
		/// Markdown document
		file: PathBuf,
		/// Only execute the block at this zero-based index
		#[arg(long, value_name = "N")]
		block: Option<usize>,
		/// Kernel selector forwarded to the interpreter
		#[arg(long)]
		kernel: Option<String>,
		/// Keep going after a block fails
		#[arg(long)]
		keep_going: bool,
	},
	/// Interactive loop over one document; the interpreter stays alive between commands
	Repl {
		/// Markdown document
		file: PathBuf,
		/// Kernel selector forwarded to the interpreter
		#[arg(long)]
		kernel: Option<String>,
	},
	/// Check the interpreter setup by evaluating `1 + 1`
	Test,
}

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default().bold())
		.usage(AnsiColor::Yellow.on_default().bold())
		.literal(AnsiColor::Green.on_default())
		.placeholder(AnsiColor::Blue.on_default())
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn test_cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_run_with_globals_after_subcommand() {
		let cli = Cli::try_parse_from([
			"nbexec",
			"run",
			"notes.md",
			"--block",
			"2",
			"--interpreter",
			"python3",
			"-vv",
			"--timeout-ms",
			"1500",
		])
		.unwrap();

		assert_eq!(cli.globals.verbose, 2);
		assert_eq!(cli.globals.interpreter.as_deref(), Some("python3"));
		assert_eq!(cli.globals.timeout_ms, Some(1500));
		match cli.command {
			Commands::Run { file, block, .. } => {
				assert_eq!(file, PathBuf::from("notes.md"));
				assert_eq!(block, Some(2));
			}
			other => panic!("Expected Run, got {:?}", other),
		}
	}

	#[test]
	fn test_json_format() {
		let cli = Cli::try_parse_from(["nbexec", "-f", "json", "test"]).unwrap();
		assert_eq!(cli.globals.format, OutputFormat::Json);
		assert!(matches!(cli.command, Commands::Test));
	}
}
