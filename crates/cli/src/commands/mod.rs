mod check;
mod repl;
mod run;

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::context::{CommandContext, log_session_events};
use crate::error::Result;

/// How long shutdown waits for the last lifecycle events to be logged.
const EVENT_DRAIN: Duration = Duration::from_millis(250);

pub async fn dispatch(cli: Cli) -> Result<()> {
	let format = cli.globals.format;
	let (ctx, events) = CommandContext::new(&cli.globals)?;
	let logger = tokio::spawn(log_session_events(events));

	let result = match cli.command {
		Commands::Run {
			file,
			block,
			kernel,
			keep_going,
		} => {
			let opts = run::RunOptions {
				block,
				kernel,
				keep_going,
			};
			run::execute(&ctx, &file, &opts, format).await
		}
		Commands::Repl { file, kernel } => repl::execute(&ctx, &file, kernel.as_deref(), format).await,
		Commands::Test => check::execute(&ctx, format).await,
	};

	ctx.shutdown();
	drop(ctx);
	if !drain_events(logger, EVENT_DRAIN).await {
		debug!(
			target = "nbexec.cli",
			waited_ms = EVENT_DRAIN.as_millis() as u64,
			"interpreters still exiting; dropping their remaining events"
		);
	}

	result
}

/// Waits up to `limit` for the event logger to finish. Every session task
/// holds an event sender, so the logger only ends once those tasks do.
async fn drain_events(logger: JoinHandle<()>, limit: Duration) -> bool {
	tokio::time::timeout(limit, logger).await.is_ok()
}
