//! End-to-end runs of the `nbexec` binary against a shell companion script.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// Answers every request line with `<pre>ok</pre>` under the request's id.
const ECHO_KERNEL: &str = r#"
while IFS= read -r line; do
	id=${line#\{\"id\":\"}
	id=${id%%\"*}
	printf '{"id":"%s","body":"<pre>ok</pre>"}\n' "$id"
done
"#;

struct Workspace {
	dir: TempDir,
}

impl Workspace {
	fn new() -> Self {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join(".nbexec")).unwrap();
		fs::write(dir.path().join(".nbexec/nbexec-kernel.py"), ECHO_KERNEL).unwrap();
		fs::write(dir.path().join("settings.json"), r#"{"pythonInterpreter": "sh"}"#).unwrap();
		Self { dir }
	}

	fn path(&self) -> &Path {
		self.dir.path()
	}

	fn write_doc(&self, name: &str, text: &str) -> PathBuf {
		let path = self.path().join(name);
		fs::write(&path, text).unwrap();
		path
	}

	fn nbexec(&self, args: &[&str]) -> Output {
		Command::new(env!("CARGO_BIN_EXE_nbexec"))
			.current_dir(self.path())
			.env_remove("NBEXEC_INTERPRETER")
			.env_remove("NBEXEC_SCRIPT")
			.env_remove("RUST_LOG")
			.arg("--config")
			.arg(self.path().join("settings.json"))
			.args(args)
			.output()
			.expect("failed to execute nbexec")
	}
}

fn json_lines(output: &Output) -> Vec<Value> {
	String::from_utf8_lossy(&output.stdout)
		.lines()
		.map(|line| serde_json::from_str(line).unwrap())
		.collect()
}

#[test]
fn run_executes_every_block_in_order() {
	let ws = Workspace::new();
	ws.write_doc(
		"notes.md",
		"# Notes\n\n```jupyter\n1 + 1\n```\n\n```python\nskipped\n```\n\n```jupyter\n2 + 2\n```\n",
	);

	let output = ws.nbexec(&["-f", "json", "run", "notes.md"]);
	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

	let reports = json_lines(&output);
	assert_eq!(reports.len(), 2);
	assert_eq!(reports[0]["block"], 0);
	assert_eq!(reports[0]["line"], 3);
	assert_eq!(reports[0]["ok"], true);
	assert_eq!(reports[0]["output"], "<pre>ok</pre>");
	assert_eq!(reports[1]["block"], 1);
}

#[test]
fn run_single_block_in_text_mode() {
	let ws = Workspace::new();
	ws.write_doc("notes.md", "```jupyter\na\n```\n```jupyter\nb\n```\n");

	let output = ws.nbexec(&["run", "notes.md", "--block", "1"]);

	assert!(output.status.success());
	assert_eq!(String::from_utf8_lossy(&output.stdout), "<pre>ok</pre>\n");
}

#[test]
fn run_without_blocks_fails() {
	let ws = Workspace::new();
	ws.write_doc("empty.md", "# nothing to run\n");

	let output = ws.nbexec(&["run", "empty.md"]);

	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("no jupyter code blocks"));
}

#[test]
fn frontmatter_interpreter_that_does_not_exist_fails_the_block() {
	let ws = Workspace::new();
	ws.write_doc(
		"broken.md",
		"---\njupyter:\n  interpreter: /nonexistent/python\n---\n```jupyter\n1\n```\n",
	);

	let output = ws.nbexec(&["-f", "json", "run", "broken.md"]);

	assert!(!output.status.success());
	let reports = json_lines(&output);
	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0]["ok"], false);
	assert!(reports[0]["error"].as_str().unwrap().contains("/nonexistent/python"));
}

#[test]
fn environment_check_succeeds() {
	let ws = Workspace::new();

	let output = ws.nbexec(&["-f", "json", "test"]);

	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
	let reports = json_lines(&output);
	assert_eq!(reports[0]["ok"], true);
	assert_eq!(reports[0]["output"], "<pre>ok</pre>");
}

#[test]
fn missing_companion_script_is_reported() {
	let ws = Workspace::new();
	fs::remove_file(ws.path().join(".nbexec/nbexec-kernel.py")).unwrap();

	let output = ws.nbexec(&["test"]);

	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("nbexec-kernel.py"));
}
