//! Newline framing for interpreter output.
//!
//! Stdout arrives in arbitrary chunks. [`FrameBuffer`] accumulates them and
//! yields one [`ResponseFrame`] per complete line; whatever follows the last
//! terminator stays buffered until the next chunk. A peer that flushes two
//! replies at once yields both, in order.

use nbexec_protocol::{FRAME_TERMINATOR, ResponseFrame};

use crate::error::{Error, Result};

/// Upper bound for a single unterminated frame (64 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Accumulates output chunks and splits them into response frames.
#[derive(Debug)]
pub struct FrameBuffer {
	buf: Vec<u8>,
	max_frame_bytes: usize,
}

impl Default for FrameBuffer {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_FRAME_BYTES)
	}
}

impl FrameBuffer {
	pub fn new(max_frame_bytes: usize) -> Self {
		Self {
			buf: Vec::new(),
			max_frame_bytes,
		}
	}

	/// Appends a chunk and decodes every frame it completes.
	///
	/// Decoding stops at the first malformed line: the error is the last
	/// element of the returned vector and the buffer is cleared, since the
	/// stream position is no longer trustworthy. Frames decoded before the
	/// bad line are still returned ahead of it.
	pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ResponseFrame>> {
		let mut search = self.buf.len();
		self.buf.extend_from_slice(chunk);

		let mut decoded = Vec::new();
		let mut consumed = 0;

		while let Some(offset) = self.buf[search..]
			.iter()
			.position(|b| *b == FRAME_TERMINATOR)
		{
			let end = search + offset;
			let line = &self.buf[consumed..end];
			let line = line.strip_suffix(b"\r").unwrap_or(line);
			consumed = end + 1;
			search = consumed;

			if line.iter().all(u8::is_ascii_whitespace) {
				continue;
			}

			match serde_json::from_slice::<ResponseFrame>(line) {
				Ok(frame) => decoded.push(Ok(frame)),
				Err(e) => {
					decoded.push(Err(Error::Protocol(format!(
						"malformed response frame: {e}"
					))));
					self.buf.clear();
					return decoded;
				}
			}
		}

		self.buf.drain(..consumed);

		if self.buf.len() > self.max_frame_bytes {
			self.buf.clear();
			decoded.push(Err(Error::FrameTooLarge {
				limit: self.max_frame_bytes,
			}));
		}

		decoded
	}

	/// Bytes of the current partial frame.
	pub fn pending_len(&self) -> usize {
		self.buf.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}
}

#[cfg(test)]
mod tests;
