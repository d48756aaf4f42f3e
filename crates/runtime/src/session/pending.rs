//! Correlation table for in-flight requests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

type Completion = oneshot::Sender<Result<Value>>;

#[derive(Default)]
struct Table {
	waiters: HashMap<String, Completion>,
	/// Set once the output stream is gone; later registrations are refused.
	closed: Option<String>,
}

/// Pending completions keyed by correlation id.
#[derive(Clone, Default)]
pub(crate) struct PendingRequests {
	table: Arc<Mutex<Table>>,
}

impl PendingRequests {
	/// Registers a completion for `id`.
	///
	/// Fails if the id is already pending or the table has been closed.
	pub(crate) fn register(&self, key: &str, id: &str) -> Result<oneshot::Receiver<Result<Value>>> {
		let mut table = self.table.lock();
		if let Some(reason) = &table.closed {
			return Err(Error::SessionClosed {
				key: key.to_string(),
				reason: reason.clone(),
			});
		}
		if table.waiters.contains_key(id) {
			return Err(Error::Protocol(format!("correlation id already pending: {id}")));
		}

		let (tx, rx) = oneshot::channel();
		table.waiters.insert(id.to_string(), tx);
		Ok(rx)
	}

	/// Resolves the completion for `id`. Returns false when nothing was waiting.
	pub(crate) fn resolve(&self, id: &str, body: Value) -> bool {
		let Some(tx) = self.table.lock().waiters.remove(id) else {
			return false;
		};
		// Receiver may have been dropped between removal and send.
		let _ = tx.send(Ok(body));
		true
	}

	pub(crate) fn remove(&self, id: &str) -> bool {
		self.table.lock().waiters.remove(id).is_some()
	}

	/// Rejects every waiter and refuses further registrations.
	pub(crate) fn close(&self, reason: &str, make_error: impl Fn() -> Error) -> usize {
		let drained: Vec<_> = {
			let mut table = self.table.lock();
			table.closed.get_or_insert_with(|| reason.to_string());
			table.waiters.drain().collect()
		};

		let count = drained.len();
		for (_, tx) in drained {
			let _ = tx.send(Err(make_error()));
		}
		count
	}

	pub(crate) fn len(&self) -> usize {
		self.table.lock().waiters.len()
	}
}

/// RAII guard removing the table entry when a request future is dropped early.
pub(crate) struct CancelGuard {
	id: String,
	pending: PendingRequests,
	completed: bool,
}

impl CancelGuard {
	pub(crate) fn new(id: String, pending: PendingRequests) -> Self {
		Self {
			id,
			pending,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		if self.pending.remove(&self.id) {
			tracing::debug!(id = %self.id, "CancelGuard: removed abandoned request");
		}
	}
}

/// Future returned by [`InterpreterSession::request`](super::InterpreterSession::request).
pub(crate) struct ResponseFuture {
	pub(crate) rx: oneshot::Receiver<Result<Value>>,
	pub(crate) guard: CancelGuard,
	pub(crate) key: String,
}

impl Future for ResponseFuture {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.complete();
				let key = std::mem::take(&mut self.key);
				Poll::Ready(
					result
						.map_err(|_| Error::SessionClosed {
							key,
							reason: "completion dropped".to_string(),
						})
						.and_then(|r| r),
				)
			}
			Poll::Pending => Poll::Pending,
		}
	}
}
