//! Per-document session registry.
//!
//! The registry is an owned value: the integration layer creates one at
//! startup, asks it for a session whenever a document needs code executed,
//! and calls [`SessionRegistry::dispose_all`] on shutdown.
//!
//! A live session is reused while its interpreter path matches the desired
//! one. A mismatch, or a session that is no longer running, causes the old
//! session to be stopped and replaced. The lookup, decision, and insertion
//! happen under a single map-entry lock with no await in between, so two
//! concurrent callers can never spawn two processes for one key.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::event::{EventReceiver, EventSender};
use crate::framing::DEFAULT_MAX_FRAME_BYTES;
use crate::key::SessionKey;
use crate::launcher::{LaunchConfig, Launcher, ProcessLauncher};
use crate::session::InterpreterSession;

/// Launch parameters shared by every session the registry creates.
#[derive(Debug, Clone)]
pub struct SessionTemplate {
	/// Companion script passed as the first positional argument.
	pub script: PathBuf,
	/// Working directory for every interpreter.
	pub working_dir: Option<PathBuf>,
	pub max_frame_bytes: usize,
}

impl SessionTemplate {
	pub fn new(script: impl Into<PathBuf>) -> Self {
		Self {
			script: script.into(),
			working_dir: None,
			max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
		}
	}

	pub fn working_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
		self.working_dir = dir.map(Into::into);
		self
	}

	pub fn max_frame_bytes(mut self, limit: usize) -> Self {
		self.max_frame_bytes = limit;
		self
	}

	/// Launch configuration for `key`: `<interpreter> <script> <key>`.
	pub fn launch_config(&self, key: &SessionKey, interpreter: &Path) -> LaunchConfig {
		LaunchConfig::new(interpreter)
			.arg(self.script.as_os_str())
			.arg(OsString::from(key.as_str()))
			.working_dir(self.working_dir.as_deref())
			.max_frame_bytes(self.max_frame_bytes)
	}
}

/// Maps session keys to interpreter sessions.
pub struct SessionRegistry<L = ProcessLauncher> {
	sessions: DashMap<SessionKey, Arc<InterpreterSession>>,
	template: SessionTemplate,
	launcher: L,
	events: EventSender,
}

impl SessionRegistry<ProcessLauncher> {
	/// Creates a registry that spawns real interpreter processes.
	///
	/// The returned receiver yields lifecycle events from every session.
	pub fn new(template: SessionTemplate) -> (Self, EventReceiver) {
		Self::with_launcher(template, ProcessLauncher)
	}
}

impl<L: Launcher> SessionRegistry<L> {
	pub fn with_launcher(template: SessionTemplate, launcher: L) -> (Self, EventReceiver) {
		let (events, events_rx) = mpsc::unbounded_channel();
		let registry = Self {
			sessions: DashMap::new(),
			template,
			launcher,
			events,
		};
		(registry, events_rx)
	}

	/// Returns a session for `key` that runs `interpreter`, creating or
	/// replacing one as needed.
	///
	/// Reused sessions keep their pending requests and buffered output.
	pub fn get_or_create(
		&self,
		key: &SessionKey,
		interpreter: impl AsRef<Path>,
	) -> Arc<InterpreterSession> {
		let desired = self.template.launch_config(key, interpreter.as_ref());

		match self.sessions.entry(key.clone()) {
			Entry::Occupied(mut entry) => {
				let current = entry.get();
				let compatible = current.launch_config().is_compatible(&desired);
				if compatible && current.is_alive() {
					return Arc::clone(current);
				}

				if compatible {
					info!(
						target = "nbexec.registry",
						key = %key,
						state = ?current.state(),
						"session no longer running; replacing"
					);
				} else {
					info!(
						target = "nbexec.registry",
						key = %key,
						current = %current.launch_config().interpreter.display(),
						desired = %desired.interpreter.display(),
						"interpreter path changed; replacing session"
					);
				}
				current.stop();

				let session = self.launch(key, desired);
				entry.insert(Arc::clone(&session));
				session
			}
			Entry::Vacant(entry) => {
				let session = self.launch(key, desired);
				entry.insert(Arc::clone(&session));
				info!(target = "nbexec.registry", key = %key, "created session");
				session
			}
		}
	}

	/// Current session for `key`, without creating one.
	pub fn get(&self, key: &str) -> Option<Arc<InterpreterSession>> {
		self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
	}

	/// Stops and forgets the session for `key`. Unknown keys are ignored.
	pub fn remove_and_stop(&self, key: &str) -> bool {
		match self.sessions.remove(key) {
			Some((key, session)) => {
				debug!(target = "nbexec.registry", key = %key, "stopping session");
				session.stop();
				true
			}
			None => false,
		}
	}

	/// Stops and forgets `session`, but only while it is still the one stored
	/// under its key. A replacement installed meanwhile is left alone.
	pub fn remove_session(&self, session: &Arc<InterpreterSession>) -> bool {
		let removed = self
			.sessions
			.remove_if(session.key().as_str(), |_, current| Arc::ptr_eq(current, session));
		match removed {
			Some((key, session)) => {
				debug!(target = "nbexec.registry", key = %key, "stopping session");
				session.stop();
				true
			}
			None => false,
		}
	}

	/// Stops every session. Called once at shutdown.
	pub fn dispose_all(&self) {
		let keys: Vec<SessionKey> = self.sessions.iter().map(|e| e.key().clone()).collect();
		for key in &keys {
			self.remove_and_stop(key.as_str());
		}
		if !keys.is_empty() {
			info!(target = "nbexec.registry", count = keys.len(), "disposed all sessions");
		}
	}

	pub fn keys(&self) -> Vec<SessionKey> {
		let mut keys: Vec<_> = self.sessions.iter().map(|e| e.key().clone()).collect();
		keys.sort();
		keys
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}

	pub fn template(&self) -> &SessionTemplate {
		&self.template
	}

	fn launch(&self, key: &SessionKey, config: LaunchConfig) -> Arc<InterpreterSession> {
		Arc::new(
			self.launcher
				.launch(key.clone(), config, self.events.clone()),
		)
	}
}
