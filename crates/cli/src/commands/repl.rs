//! Interactive loop over one document.
//!
//! The document is re-read before every command, so editing its frontmatter
//! interpreter between runs replaces the session on the next `run`.

use std::path::Path;

use anyhow::{anyhow, bail};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::run::select_blocks;
use crate::context::CommandContext;
use crate::document::Document;
use crate::error::Result;
use crate::output::{self, BlockReport, OutputFormat};

const HELP: &str = "\
commands:
  run [N|all]   execute block N, or every block (default)
  restart       restart the interpreter's kernel
  status        show the session state for this document
  sessions      list open sessions
  help          show this help
  quit          leave";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
	Run(Option<usize>),
	Restart,
	Status,
	Sessions,
	Help,
	Quit,
}

fn parse_command(line: &str) -> anyhow::Result<ReplCommand> {
	let mut words = line.split_whitespace();
	let command = match words.next() {
		Some("run" | "r") => match words.next() {
			None | Some("all") => ReplCommand::Run(None),
			Some(n) => ReplCommand::Run(Some(
				n.parse()
					.map_err(|_| anyhow!("expected a block number or `all`, got `{}`", n))?,
			)),
		},
		Some("restart") => ReplCommand::Restart,
		Some("status") => ReplCommand::Status,
		Some("sessions") => ReplCommand::Sessions,
		Some("help" | "?") => ReplCommand::Help,
		Some("quit" | "exit" | "q") => ReplCommand::Quit,
		Some(other) => bail!("unknown command `{}` (try `help`)", other),
		None => bail!("empty command"),
	};
	if let Some(extra) = words.next() {
		bail!("unexpected argument `{}`", extra);
	}
	Ok(command)
}

pub async fn execute(
	ctx: &CommandContext,
	file: &Path,
	kernel: Option<&str>,
	format: OutputFormat,
) -> Result<()> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	eprintln!("{} {} (type `help`)", "nbexec".bold(), file.display());
	prompt();

	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		if !line.is_empty() {
			match parse_command(line) {
				Ok(ReplCommand::Quit) => break,
				Ok(command) => {
					if let Err(err) = handle(ctx, file, kernel, command, format).await {
						output::print_error_stderr(&err);
					}
				}
				Err(err) => eprintln!("{} {}", "error:".red().bold(), err),
			}
		}
		prompt();
	}
	Ok(())
}

fn prompt() {
	eprint!("{} ", ">".cyan());
}

async fn handle(
	ctx: &CommandContext,
	file: &Path,
	kernel: Option<&str>,
	command: ReplCommand,
	format: OutputFormat,
) -> Result<()> {
	match command {
		ReplCommand::Run(only) => {
			let doc = Document::load(file)?;
			for block in select_blocks(&doc, only)? {
				let result = ctx.execute(&doc, block.index, kernel).await;
				output::print_block(&BlockReport::new(&block, &result), format)?;
				if result.is_err() {
					break;
				}
			}
		}
		ReplCommand::Restart => {
			let doc = Document::load(file)?;
			ctx.restart_kernel(&doc).await?;
			eprintln!("{} kernel restarted", "ok".green().bold());
		}
		ReplCommand::Status => {
			let doc = Document::load(file)?;
			let state = match ctx.session_state(&doc) {
				Some(state) => format!("{:?}", state),
				None => "not started".to_string(),
			};
			eprintln!(
				"session {}\n  interpreter {}\n  state {}",
				doc.session_key(),
				ctx.interpreter_for(Some(&doc)),
				state
			);
		}
		ReplCommand::Sessions => {
			for key in ctx.open_sessions() {
				eprintln!("{}", key);
			}
		}
		ReplCommand::Help => eprintln!("{}", HELP),
		ReplCommand::Quit => {}
	}
	Ok(())
}
