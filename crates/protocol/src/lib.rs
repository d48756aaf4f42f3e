//! Wire types for the nbexec interpreter protocol.
//!
//! The session and the interpreter-side companion script exchange one JSON
//! document per line over the child's standard streams:
//!
//! ```text
//! session → interpreter   {"id":"<uuid>","body":{"command":"execute","source":"1 + 1"}}\n
//! interpreter → session   {"id":"<uuid>","body":"<div>…</div>"}\n
//! ```
//!
//! The `body` is opaque to the transport layer. [`Command`] models the bodies
//! the companion script understands today.
//!
//! # Main Types
//!
//! - [`RequestFrame`] - A correlated request written to the interpreter's stdin
//! - [`ResponseFrame`] - A correlated reply read from the interpreter's stdout
//! - [`Command`] - Typed request bodies (`execute`, `restart_kernel`)

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line terminator that closes every frame in both directions.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Request written to the interpreter, one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame<B = Value> {
	/// Correlation id, unique among the session's pending requests.
	pub id: String,
	/// Caller-defined payload.
	pub body: B,
}

impl<B: Serialize> RequestFrame<B> {
	pub fn new(id: impl Into<String>, body: B) -> Self {
		Self {
			id: id.into(),
			body,
		}
	}

	/// Encodes the frame as a single JSON line including the terminator.
	pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
		let mut line = serde_json::to_vec(self)?;
		line.push(FRAME_TERMINATOR);
		Ok(line)
	}
}

/// Reply read from the interpreter, one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
	/// Id of the request this reply answers.
	pub id: String,
	/// Result payload; `null` when the peer omits it.
	#[serde(default)]
	pub body: Value,
}

/// Commands understood by the companion interpreter script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
	/// Execute source in the document's kernel; replies with rendered HTML.
	Execute {
		source: String,
		/// Kernel selector, left to the interpreter side to interpret.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		kernel: Option<String>,
	},
	/// Restart the document's kernel; replies with an empty string.
	RestartKernel,
}

impl Command {
	pub fn execute(source: impl Into<String>) -> Self {
		Self::Execute {
			source: source.into(),
			kernel: None,
		}
	}

	/// Returns the wire name of the command.
	pub fn name(&self) -> &'static str {
		match self {
			Command::Execute { .. } => "execute",
			Command::RestartKernel => "restart_kernel",
		}
	}
}
