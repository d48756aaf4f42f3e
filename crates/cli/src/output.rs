//! Rendering of block results.
//!
//! Text output prints interpreter output as-is (the companion script returns
//! HTML), separated by a status line per block on stderr. JSON output prints
//! one object per line on stdout:
//!
//! ```json
//! {"block":0,"line":7,"ok":true,"output":"<pre>2</pre>"}
//! {"block":1,"line":12,"ok":false,"error":"interpreter for notes.md closed: exited"}
//! ```

use std::io::{self, Write};

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use crate::document::CodeBlock;
use crate::error::CliError;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Raw interpreter output with status lines on stderr
	#[default]
	Text,
	/// One JSON object per block
	Json,
}

/// Outcome of executing one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
	pub block: usize,
	pub line: usize,
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub output: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl BlockReport {
	pub fn new(block: &CodeBlock, result: &Result<Value, CliError>) -> Self {
		match result {
			Ok(output) => Self {
				block: block.index,
				line: block.line,
				ok: true,
				output: Some(output.clone()),
				error: None,
			},
			Err(err) => Self {
				block: block.index,
				line: block.line,
				ok: false,
				output: None,
				error: Some(error_chain(err)),
			},
		}
	}
}

/// Interpreter output as printed in text mode: strings verbatim, anything
/// else as pretty JSON.
pub fn render_value(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
	}
}

pub fn print_block(report: &BlockReport, format: OutputFormat) -> io::Result<()> {
	let mut out = io::stdout().lock();
	match format {
		OutputFormat::Json => {
			serde_json::to_writer(&mut out, report)?;
			writeln!(out)?;
		}
		OutputFormat::Text => {
			let status = if report.ok {
				"ok".green().bold()
			} else {
				"failed".red().bold()
			};
			eprintln!("{} block {} (line {})", status, report.block, report.line);
			if let Some(output) = &report.output {
				let rendered = render_value(output);
				if !rendered.is_empty() {
					writeln!(out, "{}", rendered)?;
				}
			}
			if let Some(error) = &report.error {
				eprintln!("  {}", error.red());
			}
		}
	}
	out.flush()
}

/// Prints the outcome of the environment check.
pub fn print_check(result: &Result<Value, CliError>, format: OutputFormat) -> io::Result<()> {
	let mut out = io::stdout().lock();
	match format {
		OutputFormat::Json => {
			let value = match result {
				Ok(output) => serde_json::json!({ "ok": true, "output": output }),
				Err(err) => serde_json::json!({ "ok": false, "error": error_chain(err) }),
			};
			serde_json::to_writer(&mut out, &value)?;
			writeln!(out)?;
		}
		OutputFormat::Text => match result {
			Ok(output) => {
				writeln!(out, "{} interpreter answered: {}", "ok".green().bold(), render_value(output))?;
			}
			Err(err) => {
				writeln!(out, "{} {}", "failed".red().bold(), error_chain(err))?;
			}
		},
	}
	out.flush()
}

pub fn print_error_stderr(err: &CliError) {
	eprintln!("{} {}", "error:".red().bold(), error_chain(err));
}

/// `err` and its sources joined with `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
	let mut message = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		let text = cause.to_string();
		if !message.contains(&text) {
			message.push_str(": ");
			message.push_str(&text);
		}
		source = cause.source();
	}
	message
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn block() -> CodeBlock {
		CodeBlock {
			index: 2,
			line: 14,
			source: "1 + 1".to_string(),
		}
	}

	#[test]
	fn test_render_value() {
		assert_eq!(render_value(&json!("<pre>2</pre>")), "<pre>2</pre>");
		assert_eq!(render_value(&Value::Null), "");
		assert_eq!(render_value(&json!({"a": 1})), "{\n  \"a\": 1\n}");
	}

	#[test]
	fn test_successful_block_report_serialization() {
		let report = BlockReport::new(&block(), &Ok(json!("<pre>2</pre>")));
		let line = serde_json::to_string(&report).unwrap();
		assert_eq!(line, r#"{"block":2,"line":14,"ok":true,"output":"<pre>2</pre>"}"#);
	}

	#[test]
	fn test_failed_block_report_serialization() {
		let err = CliError::Timeout {
			key: "notes.md".to_string(),
			ms: 250,
		};
		let report = BlockReport::new(&block(), &Err(err));
		let value = serde_json::to_value(&report).unwrap();

		assert_eq!(value["ok"], json!(false));
		assert!(value.get("output").is_none());
		assert!(value["error"].as_str().unwrap().contains("250"));
	}

	#[test]
	fn test_error_chain_includes_sources() {
		let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
		let err = CliError::DocumentRead {
			path: "missing.md".into(),
			source: io,
		};
		let chain = error_chain(&err);
		assert!(chain.contains("missing.md"));
		assert!(chain.contains("no such file"));
	}
}
