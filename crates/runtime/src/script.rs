//! Companion script location.
//!
//! The interpreter runs a script that speaks the line protocol. Searched in
//! order:
//! 1. An explicit path (relative paths resolve against the working directory)
//! 2. The `NBEXEC_SCRIPT` environment variable
//! 3. `<working dir>/.nbexec/nbexec-kernel.py`

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable overriding the companion script path.
pub const SCRIPT_ENV: &str = "NBEXEC_SCRIPT";

/// Directory (under the working directory) holding the default script.
pub const SCRIPT_DIR: &str = ".nbexec";

/// File name of the default companion script.
pub const SCRIPT_NAME: &str = "nbexec-kernel.py";

/// Locates the companion script.
///
/// # Errors
///
/// Returns [`Error::ScriptNotFound`] listing every candidate that was tried.
pub fn locate_script(explicit: Option<&Path>, working_dir: Option<&Path>) -> Result<PathBuf> {
	locate_script_with(explicit, working_dir, std::env::var_os(SCRIPT_ENV))
}

fn locate_script_with(
	explicit: Option<&Path>,
	working_dir: Option<&Path>,
	env_value: Option<OsString>,
) -> Result<PathBuf> {
	let candidates = [
		("explicit", explicit.map(|p| resolve(p, working_dir))),
		(SCRIPT_ENV, env_value.map(|v| resolve(Path::new(&v), working_dir))),
		(
			"working dir",
			working_dir.map(|dir| dir.join(SCRIPT_DIR).join(SCRIPT_NAME)),
		),
	];

	let mut searched = Vec::new();
	for (source, candidate) in candidates {
		let Some(path) = candidate else {
			continue;
		};
		let found = path.is_file();
		debug!(target = "nbexec.script", source, path = %path.display(), found, "script candidate");
		if found {
			return Ok(path);
		}
		searched.push(path);
	}

	Err(Error::ScriptNotFound { searched })
}

fn resolve(path: &Path, working_dir: Option<&Path>) -> PathBuf {
	match working_dir {
		Some(dir) if path.is_relative() => dir.join(path),
		_ => path.to_path_buf(),
	}
}
