use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read settings: {path}")]
	SettingsRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid settings file: {path}")]
	SettingsParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to read document: {path}")]
	DocumentRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("no jupyter code blocks in {path}")]
	NoBlocks { path: PathBuf },

	#[error("block {index} out of range ({count} blocks)")]
	BlockOutOfRange { index: usize, count: usize },

	#[error("{failed} of {total} blocks failed")]
	BlocksFailed { failed: usize, total: usize },

	#[error("environment check failed")]
	CheckFailed,

	#[error("no response within {ms}ms from session {key}")]
	Timeout { key: String, ms: u64 },

	#[error(transparent)]
	Runtime(#[from] nbexec_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	/// Whether the failing session should be discarded before the next request.
	pub fn poisons_session(&self) -> bool {
		match self {
			CliError::Timeout { .. } => true,
			CliError::Runtime(err) => err.is_session_fatal(),
			_ => false,
		}
	}
}
