use std::sync::Arc;
use std::time::Duration;

use nbexec_protocol::Command;
use nbexec_runtime::{
	EventReceiver, InterpreterSession, SessionEventKind, SessionKey, SessionRegistry,
	SessionTemplate, locate_script,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::GlobalArgs;
use crate::document::Document;
use crate::error::{CliError, Result};
use crate::settings::Settings;

/// Session key used by the environment check.
pub const TEST_DOCUMENT_KEY: &str = "test-document";

/// Shared state for one CLI invocation: settings plus the session registry.
pub struct CommandContext {
	pub settings: Settings,
	registry: SessionRegistry,
	interpreter_flag: Option<String>,
	timeout: Option<Duration>,
}

impl CommandContext {
	/// Resolves settings and the companion script, and creates the registry.
	pub fn new(globals: &GlobalArgs) -> Result<(Self, EventReceiver)> {
		let mut settings = Settings::load(globals.config.as_deref())?;
		settings.apply_env(|name| std::env::var(name).ok());
		if let Some(script) = &globals.script {
			settings.script_path = Some(script.clone());
		}
		if let Some(ms) = globals.timeout_ms {
			settings.request_timeout_ms = Some(ms);
		}

		let working_dir = match globals.cwd.clone().or_else(|| settings.working_dir.clone()) {
			Some(dir) => dir,
			None => std::env::current_dir()?,
		};
		let script = locate_script(settings.script_path.as_deref(), Some(&working_dir))?;
		info!(target = "nbexec.cli", script = %script.display(), cwd = %working_dir.display(), "using companion script");

		let template = SessionTemplate::new(script)
			.working_dir(Some(working_dir))
			.max_frame_bytes(settings.max_frame_bytes);
		let (registry, events) = SessionRegistry::new(template);

		let ctx = Self {
			timeout: settings.request_timeout_ms.map(Duration::from_millis),
			interpreter_flag: globals.interpreter.clone(),
			settings,
			registry,
		};
		Ok((ctx, events))
	}

	/// Effective interpreter: flag, then frontmatter, then settings.
	pub fn interpreter_for(&self, doc: Option<&Document>) -> String {
		resolve_interpreter(
			self.interpreter_flag.as_deref(),
			doc.and_then(Document::interpreter_override),
			&self.settings.python_interpreter,
		)
	}

	pub fn session_for(&self, doc: &Document) -> Arc<InterpreterSession> {
		self.registry
			.get_or_create(&doc.session_key(), self.interpreter_for(Some(doc)))
	}

	/// Executes one block of `doc` with the setup script prepended.
	pub async fn execute(&self, doc: &Document, index: usize, kernel: Option<&str>) -> Result<Value> {
		let block = doc.block(index)?;
		let command = Command::Execute {
			source: self.settings.source_with_setup(&block.source),
			kernel: kernel.map(str::to_string),
		};
		let session = self.session_for(doc);
		self.call(&session, &command).await
	}

	pub async fn restart_kernel(&self, doc: &Document) -> Result<()> {
		let session = self.session_for(doc);
		self.call(&session, &Command::RestartKernel).await?;
		Ok(())
	}

	/// Runs `1 + 1` in a throwaway session, then removes it.
	pub async fn check_environment(&self) -> Result<Value> {
		let key = SessionKey::from(TEST_DOCUMENT_KEY);
		let session = self.registry.get_or_create(&key, self.interpreter_for(None));
		let result = self.call(&session, &Command::execute("1 + 1")).await;
		self.registry.remove_and_stop(TEST_DOCUMENT_KEY);
		result
	}

	/// Sends `command`, applying the configured deadline. A session that timed
	/// out or failed fatally is dropped so the next call starts fresh.
	async fn call(&self, session: &Arc<InterpreterSession>, command: &Command) -> Result<Value> {
		let result = match self.timeout {
			Some(limit) => match tokio::time::timeout(limit, session.send(command)).await {
				Ok(result) => result.map_err(CliError::from),
				Err(_) => Err(CliError::Timeout {
					key: session.key().to_string(),
					ms: limit.as_millis() as u64,
				}),
			},
			None => session.send(command).await.map_err(CliError::from),
		};

		if let Err(err) = &result {
			if err.poisons_session() {
				warn!(target = "nbexec.cli", key = %session.key(), error = %err, "discarding session");
				self.registry.remove_session(session);
			}
		}
		result
	}

	pub fn open_sessions(&self) -> Vec<SessionKey> {
		self.registry.keys()
	}

	pub fn session_state(&self, doc: &Document) -> Option<nbexec_runtime::SessionState> {
		self.registry
			.get(doc.session_key().as_str())
			.map(|session| session.state())
	}

	pub fn shutdown(&self) {
		self.registry.dispose_all();
	}
}

fn resolve_interpreter(flag: Option<&str>, frontmatter: Option<&str>, global: &str) -> String {
	flag.or(frontmatter).unwrap_or(global).to_string()
}

/// Logs lifecycle events until every session sender is gone.
pub async fn log_session_events(mut events: EventReceiver) {
	while let Some(event) = events.recv().await {
		match event.kind {
			SessionEventKind::LaunchFailed { reason } => {
				warn!(target = "nbexec.cli", key = %event.key, error = %reason, "interpreter failed to start; check the interpreter path");
			}
			SessionEventKind::Faulted { reason } => {
				warn!(target = "nbexec.cli", key = %event.key, error = %reason, "interpreter session faulted");
			}
			SessionEventKind::Exited { code } => {
				info!(target = "nbexec.cli", key = %event.key, code, "interpreter exited");
			}
		}
	}
}
