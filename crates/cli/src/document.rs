//! Markdown documents with executable `jupyter` code blocks.
//!
//! A document may pin its interpreter in YAML frontmatter:
//!
//! ```text
//! ---
//! jupyter:
//!   interpreter: /opt/envs/analysis/bin/python
//! ---
//! ```
//!
//! `obsidian-jupyter` is read as well when `jupyter` sets no interpreter.

use std::fs;
use std::path::{Path, PathBuf};

use nbexec_runtime::SessionKey;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde_yaml::Value as Yaml;
use tracing::warn;

use crate::error::{CliError, Result};

/// Fence info string that marks an executable block.
pub const BLOCK_LANGUAGE: &str = "jupyter";

/// Frontmatter tables holding per-document overrides, in lookup order.
pub const FRONTMATTER_KEYS: [&str; 2] = ["jupyter", "obsidian-jupyter"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
	/// Zero-based position among the document's executable blocks.
	pub index: usize,
	/// One-based line of the opening fence.
	pub line: usize,
	pub source: String,
}

#[derive(Debug, Clone)]
pub struct Document {
	pub path: PathBuf,
	pub frontmatter: Option<Yaml>,
	pub blocks: Vec<CodeBlock>,
}

impl Document {
	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).map_err(|source| CliError::DocumentRead {
			path: path.to_path_buf(),
			source,
		})?;
		Ok(Self::parse(path, &text))
	}

	pub fn parse(path: &Path, text: &str) -> Self {
		let (frontmatter, body_start) = split_frontmatter(text);
		let frontmatter = frontmatter.and_then(|raw| match serde_yaml::from_str::<Yaml>(raw) {
			Ok(value) => Some(value),
			Err(e) => {
				warn!(target = "nbexec.document", path = %path.display(), error = %e, "ignoring invalid frontmatter");
				None
			}
		});

		Self {
			path: path.to_path_buf(),
			frontmatter,
			blocks: extract_blocks(text, body_start),
		}
	}

	/// Session key: the document's canonical path when it resolves.
	pub fn session_key(&self) -> SessionKey {
		let path = fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
		SessionKey::from(path.display().to_string())
	}

	/// `interpreter` from the first of [`FRONTMATTER_KEYS`] that sets one.
	pub fn interpreter_override(&self) -> Option<&str> {
		let frontmatter = self.frontmatter.as_ref()?;
		FRONTMATTER_KEYS.iter().find_map(|key| {
			frontmatter
				.get(*key)?
				.get("interpreter")?
				.as_str()
				.filter(|s| !s.trim().is_empty())
		})
	}

	pub fn block(&self, index: usize) -> Result<&CodeBlock> {
		self.blocks.get(index).ok_or(CliError::BlockOutOfRange {
			index,
			count: self.blocks.len(),
		})
	}
}

/// Returns the raw frontmatter and the byte offset where the body starts.
fn split_frontmatter(text: &str) -> (Option<&str>, usize) {
	let mut lines = text.split_inclusive('\n');
	let start = match lines.next() {
		Some(first) if first.trim_end() == "---" => first.len(),
		_ => return (None, 0),
	};

	let mut offset = start;
	for line in lines {
		if line.trim_end() == "---" {
			return (Some(&text[start..offset]), offset + line.len());
		}
		offset += line.len();
	}
	(None, 0)
}

/// Fenced code blocks tagged [`BLOCK_LANGUAGE`], read as CommonMark from
/// `body_start` onward. Line numbers count from the start of `text`.
fn extract_blocks(text: &str, body_start: usize) -> Vec<CodeBlock> {
	let body = &text[body_start..];
	let line_at = |offset: usize| text[..body_start + offset].matches('\n').count() + 1;

	let mut blocks = Vec::new();
	let mut current: Option<(usize, String)> = None;

	for (event, range) in Parser::new_ext(body, Options::empty()).into_offset_iter() {
		match event {
			Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
				if info.split_whitespace().next() == Some(BLOCK_LANGUAGE) {
					current = Some((line_at(range.start), String::new()));
				}
			}
			Event::Text(chunk) => {
				if let Some((_, source)) = current.as_mut() {
					source.push_str(&chunk);
				}
			}
			Event::End(TagEnd::CodeBlock) => {
				if let Some((line, mut source)) = current.take() {
					if source.ends_with('\n') {
						source.pop();
					}
					blocks.push(CodeBlock {
						index: blocks.len(),
						line,
						source,
					});
				}
			}
			_ => {}
		}
	}

	blocks
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(text: &str) -> Document {
		Document::parse(Path::new("note.md"), text)
	}

	#[test]
	fn test_extracts_only_jupyter_blocks() {
		let doc = parse(
			"# Title\n\n```python\nprint('skip')\n```\n\n```jupyter\nx = 1\ny = x + 1\n```\n\ntext\n\n~~~jupyter\ny\n~~~\n",
		);

		assert_eq!(doc.blocks.len(), 2);
		assert_eq!(doc.blocks[0].source, "x = 1\ny = x + 1");
		assert_eq!(doc.blocks[0].line, 7);
		assert_eq!(doc.blocks[1].index, 1);
		assert_eq!(doc.blocks[1].source, "y");
	}

	#[test]
	fn test_longer_fence_contains_shorter_one() {
		let doc = parse("````jupyter\ns = '''\n```\n'''\n````\n");

		assert_eq!(doc.blocks.len(), 1);
		assert_eq!(doc.blocks[0].source, "s = '''\n```\n'''");
	}

	#[test]
	fn test_unterminated_block_runs_to_end_of_document() {
		let doc = parse("```jupyter\nx = 1\n");
		assert_eq!(doc.blocks.len(), 1);
		assert_eq!(doc.blocks[0].source, "x = 1");
	}

	#[test]
	fn test_deeply_indented_fence_does_not_close() {
		let doc = parse("```jupyter\na\n    ```\nb\n```\n");

		assert_eq!(doc.blocks.len(), 1);
		assert_eq!(doc.blocks[0].source, "a\n    ```\nb");
	}

	#[test]
	fn test_fence_inside_list_item_loses_list_indent() {
		let doc = parse("- step one:\n\n  ```jupyter\n  x = 1\n  if x:\n      y = 2\n  ```\n");

		assert_eq!(doc.blocks.len(), 1);
		assert_eq!(doc.blocks[0].source, "x = 1\nif x:\n    y = 2");
		assert_eq!(doc.blocks[0].line, 3);
	}

	#[test]
	fn test_indented_code_block_is_not_executable() {
		let doc = parse("text\n\n    jupyter\n    1 + 1\n");
		assert!(doc.blocks.is_empty());
	}

	#[test]
	fn test_frontmatter_interpreter_override() {
		let doc = parse(
			"---\ntitle: Analysis\njupyter:\n  interpreter: /opt/envs/a/bin/python\n---\n```jupyter\n1 + 1\n```\n",
		);

		assert_eq!(doc.interpreter_override(), Some("/opt/envs/a/bin/python"));
		assert_eq!(doc.blocks.len(), 1);
		assert_eq!(doc.blocks[0].line, 6);
	}

	#[test]
	fn test_legacy_frontmatter_key() {
		let doc = parse("---\nobsidian-jupyter:\n  interpreter: /usr/bin/python3\n---\n```jupyter\n1\n```\n");
		assert_eq!(doc.interpreter_override(), Some("/usr/bin/python3"));

		let doc = parse(
			"---\njupyter:\n  interpreter: /opt/a/python\nobsidian-jupyter:\n  interpreter: /opt/b/python\n---\n",
		);
		assert_eq!(doc.interpreter_override(), Some("/opt/a/python"));
	}

	#[test]
	fn test_frontmatter_is_not_scanned_for_blocks() {
		let doc = parse("---\nnote: |\n  ```jupyter\n  no\n  ```\n---\nbody\n");

		assert!(doc.blocks.is_empty());
		assert!(doc.frontmatter.is_some());
	}

	#[test]
	fn test_no_override_without_frontmatter_key() {
		let doc = parse("---\ntitle: x\n---\n");
		assert_eq!(doc.interpreter_override(), None);

		let doc = parse("no frontmatter\n");
		assert!(doc.frontmatter.is_none());
		assert_eq!(doc.interpreter_override(), None);
	}

	#[test]
	fn test_invalid_frontmatter_is_ignored() {
		let doc = parse("---\njupyter: [unclosed\n---\n```jupyter\n2\n```\n");

		assert!(doc.frontmatter.is_none());
		assert_eq!(doc.blocks.len(), 1);
	}

	#[test]
	fn test_block_out_of_range() {
		let doc = parse("```jupyter\n1\n```\n");

		assert_eq!(doc.block(0).unwrap().source, "1");
		assert!(matches!(
			doc.block(3),
			Err(CliError::BlockOutOfRange { index: 3, count: 1 })
		));
	}
}
