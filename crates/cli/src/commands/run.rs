use std::path::Path;

use tracing::info;

use crate::context::CommandContext;
use crate::document::{CodeBlock, Document};
use crate::error::{CliError, Result};
use crate::output::{self, BlockReport, OutputFormat};

#[derive(Debug, Default, Clone)]
pub struct RunOptions {
	pub block: Option<usize>,
	pub kernel: Option<String>,
	pub keep_going: bool,
}

pub async fn execute(
	ctx: &CommandContext,
	file: &Path,
	opts: &RunOptions,
	format: OutputFormat,
) -> Result<()> {
	let doc = Document::load(file)?;
	let selected = select_blocks(&doc, opts.block)?;
	info!(
		target = "nbexec.cli",
		path = %doc.path.display(),
		blocks = selected.len(),
		interpreter = %ctx.interpreter_for(Some(&doc)),
		"running document"
	);

	let mut failed = 0;
	for block in &selected {
		let result = ctx.execute(&doc, block.index, opts.kernel.as_deref()).await;
		let report = BlockReport::new(block, &result);
		output::print_block(&report, format)?;
		if result.is_err() {
			failed += 1;
			if !opts.keep_going {
				break;
			}
		}
	}

	if failed > 0 {
		return Err(CliError::BlocksFailed {
			failed,
			total: selected.len(),
		});
	}
	Ok(())
}

/// Blocks to execute: one when `only` is set, otherwise all of them in order.
pub(crate) fn select_blocks(doc: &Document, only: Option<usize>) -> Result<Vec<CodeBlock>> {
	if doc.blocks.is_empty() {
		return Err(CliError::NoBlocks {
			path: doc.path.clone(),
		});
	}
	match only {
		Some(index) => Ok(vec![doc.block(index)?.clone()]),
		None => Ok(doc.blocks.clone()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(text: &str) -> Document {
		Document::parse(Path::new("note.md"), text)
	}

	#[test]
	fn test_select_all_blocks_in_order() {
		let doc = doc("```jupyter\na\n```\n```jupyter\nb\n```\n");
		let blocks = select_blocks(&doc, None).unwrap();
		let sources: Vec<_> = blocks.iter().map(|b| b.source.as_str()).collect();
		assert_eq!(sources, ["a", "b"]);
	}

	#[test]
	fn test_select_single_block() {
		let doc = doc("```jupyter\na\n```\n```jupyter\nb\n```\n");
		let blocks = select_blocks(&doc, Some(1)).unwrap();
		assert_eq!(blocks.len(), 1);
		assert_eq!(blocks[0].source, "b");
	}

	#[test]
	fn test_document_without_blocks_is_an_error() {
		let err = select_blocks(&doc("# nothing here\n"), None).unwrap_err();
		assert!(matches!(err, CliError::NoBlocks { .. }));
	}
}
