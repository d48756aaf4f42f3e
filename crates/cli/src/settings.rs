//! User settings.
//!
//! Stored as JSON with camelCase keys. A partial file only overrides the keys
//! it names. Precedence, lowest first: defaults, settings file, environment
//! (`NBEXEC_INTERPRETER`, `NBEXEC_SCRIPT`), command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use nbexec_runtime::DEFAULT_MAX_FRAME_BYTES;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

/// Environment variable overriding the global interpreter.
pub const INTERPRETER_ENV: &str = "NBEXEC_INTERPRETER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
	/// Global interpreter, used unless a document's frontmatter overrides it.
	pub python_interpreter: String,
	/// Source prepended to every executed block.
	pub setup_script: String,
	/// Companion script run by the interpreter.
	pub script_path: Option<PathBuf>,
	/// Working directory for interpreters (defaults to the current directory).
	pub working_dir: Option<PathBuf>,
	/// Per-request deadline; unbounded when absent.
	pub request_timeout_ms: Option<u64>,
	pub max_frame_bytes: usize,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			python_interpreter: "python".to_string(),
			setup_script: String::new(),
			script_path: None,
			working_dir: None,
			request_timeout_ms: None,
			max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
		}
	}
}

impl Settings {
	/// `<config dir>/nbexec/settings.json`.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("nbexec").join("settings.json"))
	}

	/// Loads settings from `explicit`, or from [`default_path`](Self::default_path).
	///
	/// An explicit file must exist; a missing default file yields defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		match explicit {
			Some(path) => Self::from_file(path),
			None => match Self::default_path() {
				Some(path) if path.is_file() => Self::from_file(&path),
				_ => Ok(Self::default()),
			},
		}
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).map_err(|source| CliError::SettingsRead {
			path: path.to_path_buf(),
			source,
		})?;
		let settings = serde_json::from_str(&raw).map_err(|source| CliError::SettingsParse {
			path: path.to_path_buf(),
			source,
		})?;
		debug!(target = "nbexec.settings", path = %path.display(), "loaded settings");
		Ok(settings)
	}

	/// Applies environment overrides using `lookup` (normally `std::env::var`).
	pub fn apply_env<F>(&mut self, lookup: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(interpreter) = lookup(INTERPRETER_ENV).filter(|v| !v.is_empty()) {
			self.python_interpreter = interpreter;
		}
		if let Some(script) = lookup(nbexec_runtime::script::SCRIPT_ENV).filter(|v| !v.is_empty()) {
			self.script_path = Some(PathBuf::from(script));
		}
	}

	/// Source actually sent for a block: setup script, newline, block.
	pub fn source_with_setup(&self, source: &str) -> String {
		format!("{}\n{}", self.setup_script, source)
	}
}
