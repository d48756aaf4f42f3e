use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{self, OutputFormat};

/// Evaluates `1 + 1` in a throwaway session and reports the outcome.
pub async fn execute(ctx: &CommandContext, format: OutputFormat) -> Result<()> {
	let result = ctx.check_environment().await;
	output::print_check(&result, format)?;
	match result {
		Ok(_) => Ok(()),
		Err(_) => Err(CliError::CheckFailed),
	}
}
