//! Structured lifecycle signals emitted by sessions.

use crate::key::SessionKey;

/// Observable lifecycle state of an [`InterpreterSession`](crate::InterpreterSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
	/// Process is up and requests are accepted.
	Running,
	/// `stop()` closed stdin; the process may still be winding down.
	Stopped,
	/// Process output ended. Carries the exit code once known.
	Exited(Option<i32>),
	/// Peer broke the framing contract; session must be replaced.
	Faulted(String),
	/// Process could not be started.
	LaunchFailed(String),
}

impl SessionState {
	pub fn is_running(&self) -> bool {
		matches!(self, SessionState::Running)
	}
}

/// Event delivered to the owner of a session registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
	pub key: SessionKey,
	pub kind: SessionEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
	/// Spawning the interpreter failed.
	LaunchFailed { reason: String },
	/// Interpreter process terminated (or its output closed).
	Exited { code: Option<i32> },
	/// Malformed or oversized output; pending requests were rejected.
	Faulted { reason: String },
}

/// Channel on which sessions report [`SessionEvent`]s.
pub type EventSender = tokio::sync::mpsc::UnboundedSender<SessionEvent>;

/// Receiving half handed to the registry owner.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<SessionEvent>;
