//! Error types for the nbexec runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while supervising an interpreter session.
#[derive(Debug, Error)]
pub enum Error {
	/// Companion interpreter script was not found.
	#[error("Interpreter script not found (searched: {})", display_paths(.searched))]
	ScriptNotFound { searched: Vec<PathBuf> },

	/// The interpreter process could not be started.
	#[error("Failed to launch interpreter '{interpreter}': {reason}")]
	LaunchFailed { interpreter: String, reason: String },

	/// The session no longer accepts or completes requests.
	#[error("Interpreter session '{key}' closed: {reason}")]
	SessionClosed { key: String, reason: String },

	/// The interpreter sent data that is not a valid response frame.
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// A partial frame outgrew the configured buffer bound.
	#[error("Response frame exceeds {limit} bytes without a terminator")]
	FrameTooLarge { limit: usize },

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if the error means the session must be replaced.
	pub fn is_session_fatal(&self) -> bool {
		matches!(
			self,
			Error::LaunchFailed { .. }
				| Error::SessionClosed { .. }
				| Error::Protocol(_)
				| Error::FrameTooLarge { .. }
		)
	}
}

fn display_paths(paths: &[PathBuf]) -> String {
	if paths.is_empty() {
		return "nothing".to_string();
	}
	paths
		.iter()
		.map(|p| p.display().to_string())
		.collect::<Vec<_>>()
		.join(", ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn script_not_found_lists_searched_paths() {
		let err = Error::ScriptNotFound {
			searched: vec![PathBuf::from("/a/x.py"), PathBuf::from("/b/x.py")],
		};
		assert_eq!(
			err.to_string(),
			"Interpreter script not found (searched: /a/x.py, /b/x.py)"
		);
	}

	#[test]
	fn fatal_classification() {
		assert!(Error::Protocol("bad".into()).is_session_fatal());
		assert!(Error::FrameTooLarge { limit: 8 }.is_session_fatal());
		assert!(!Error::Io(std::io::Error::other("disk")).is_session_fatal());
	}
}
