//! Launch parameters and the process-spawning seam used by the registry.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::event::EventSender;
use crate::framing::DEFAULT_MAX_FRAME_BYTES;
use crate::key::SessionKey;
use crate::session::InterpreterSession;

/// Everything needed to start one interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
	/// Interpreter executable (e.g. `python`, `/usr/bin/python3`).
	pub interpreter: PathBuf,
	/// Positional arguments, conventionally `<script> <session key>`.
	pub args: Vec<OsString>,
	/// Working directory for the child; inherits ours when `None`.
	pub working_dir: Option<PathBuf>,
	/// Bound on a single unterminated response frame.
	pub max_frame_bytes: usize,
}

impl LaunchConfig {
	pub fn new(interpreter: impl Into<PathBuf>) -> Self {
		Self {
			interpreter: interpreter.into(),
			args: Vec::new(),
			working_dir: None,
			max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
		}
	}

	pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn working_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
		self.working_dir = dir.map(Into::into);
		self
	}

	pub fn max_frame_bytes(mut self, limit: usize) -> Self {
		self.max_frame_bytes = limit;
		self
	}

	pub fn interpreter(&self) -> &Path {
		&self.interpreter
	}

	/// Whether a session launched with `self` may serve requests for `desired`.
	///
	/// Only the interpreter path is compared. Argument and working-directory
	/// changes do not force a relaunch.
	pub fn is_compatible(&self, desired: &LaunchConfig) -> bool {
		self.interpreter == desired.interpreter
	}
}

/// Creates sessions for the registry.
///
/// Implementations must not fail synchronously: a launch problem is reported
/// through the returned session's state and the event channel.
pub trait Launcher: Send + Sync {
	fn launch(
		&self,
		key: SessionKey,
		config: LaunchConfig,
		events: EventSender,
	) -> InterpreterSession;
}

/// Spawns a real child process per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
	fn launch(
		&self,
		key: SessionKey,
		config: LaunchConfig,
		events: EventSender,
	) -> InterpreterSession {
		InterpreterSession::spawn(key, config, Some(events))
	}
}
