use clap::Parser;
use nbexec_cli::{cli::Cli, commands, logging, output};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.globals.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		output::print_error_stderr(&err);
		std::process::exit(1);
	}
}
