//! Interpreter session: one child process plus request/response correlation.
//!
//! # Message Flow
//!
//! 1. Caller invokes [`InterpreterSession::request`] with an opaque body
//! 2. Session generates a UUID, registers a oneshot completion under it
//! 3. The `{id, body}` line is queued to the writer task (writes stay ordered)
//! 4. The reader task frames stdout into [`ResponseFrame`]s
//! 5. Each frame resolves the completion registered under its id
//!
//! Responses may arrive in any order. A frame whose id is not pending is
//! logged and dropped. Malformed output faults the session: every pending
//! request is rejected and stdin is closed. When stdout ends or the process
//! exits, pending requests are rejected with [`Error::SessionClosed`].

mod pending;

use std::process::Stdio;
use std::sync::Arc;

use nbexec_protocol::{Command, RequestFrame, ResponseFrame};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use self::pending::{CancelGuard, PendingRequests, ResponseFuture};
use crate::error::{Error, Result};
use crate::event::{EventSender, SessionEvent, SessionEventKind, SessionState};
use crate::framing::FrameBuffer;
use crate::key::SessionKey;
use crate::launcher::LaunchConfig;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// State shared between the session handle and its I/O tasks.
struct Shared {
	key: SessionKey,
	pending: PendingRequests,
	state: Mutex<SessionState>,
	/// Queue into the stdin writer task; `None` once stdin is closing.
	outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
	events: Option<EventSender>,
	/// True when an exit watcher owns the child and reports its exit.
	supervised: bool,
}

impl Shared {
	fn emit(&self, kind: SessionEventKind) {
		if let Some(events) = &self.events {
			let _ = events.send(SessionEvent {
				key: self.key.clone(),
				kind,
			});
		}
	}

	fn close_stdin(&self) -> bool {
		self.outbound.lock().take().is_some()
	}

	fn deliver(&self, frame: ResponseFrame) {
		if self.pending.resolve(&frame.id, frame.body) {
			debug!(target = "nbexec.session", key = %self.key, id = %frame.id, "response delivered");
		} else {
			warn!(
				target = "nbexec.session",
				key = %self.key,
				id = %frame.id,
				"received response for unrecognised request"
			);
		}
	}

	fn fault(&self, err: Error) {
		let reason = err.to_string();
		error!(target = "nbexec.session", key = %self.key, error = %reason, "interpreter output fault");

		*self.state.lock() = SessionState::Faulted(reason.clone());
		let rejected = self
			.pending
			.close(&reason, || Error::Protocol(reason.clone()));
		if rejected > 0 {
			debug!(target = "nbexec.session", key = %self.key, rejected, "rejected pending requests");
		}
		self.close_stdin();
		self.emit(SessionEventKind::Faulted { reason });
	}

	fn output_closed(&self) {
		let reason = "interpreter output closed";
		let rejected = self.pending.close(reason, || Error::SessionClosed {
			key: self.key.to_string(),
			reason: reason.to_string(),
		});
		if rejected > 0 {
			warn!(
				target = "nbexec.session",
				key = %self.key,
				rejected,
				"interpreter output closed with requests pending"
			);
		}

		{
			let mut state = self.state.lock();
			if matches!(*state, SessionState::Running | SessionState::Stopped) {
				*state = SessionState::Exited(None);
			}
		}
		self.close_stdin();

		if !self.supervised {
			self.emit(SessionEventKind::Exited { code: None });
		}
	}

	fn exited(&self, code: Option<i32>) {
		{
			let mut state = self.state.lock();
			if matches!(
				*state,
				SessionState::Running | SessionState::Stopped | SessionState::Exited(_)
			) {
				*state = SessionState::Exited(code);
			}
		}

		// stdout may outlive the process when a grandchild inherited it.
		let reason = describe(&SessionState::Exited(code));
		let rejected = self.pending.close(&reason, || Error::SessionClosed {
			key: self.key.to_string(),
			reason: reason.clone(),
		});
		if rejected > 0 {
			warn!(
				target = "nbexec.session",
				key = %self.key,
				rejected,
				"interpreter exited with requests pending"
			);
		}
		self.close_stdin();
		self.emit(SessionEventKind::Exited { code });
	}
}

/// One long-lived interpreter process serving a single document.
///
/// The session exclusively owns the process's standard streams. Dropping the
/// last handle behaves like [`stop`](Self::stop).
pub struct InterpreterSession {
	shared: Arc<Shared>,
	launch: LaunchConfig,
	pid: Option<u32>,
}

impl std::fmt::Debug for InterpreterSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InterpreterSession")
			.field("key", &self.shared.key)
			.field("interpreter", &self.launch.interpreter)
			.field("pid", &self.pid)
			.field("state", &*self.shared.state.lock())
			.finish()
	}
}

impl InterpreterSession {
	/// Launches the interpreter immediately.
	///
	/// Never fails: if the process cannot be spawned the failure is logged,
	/// reported on `events`, and the session is returned in
	/// [`SessionState::LaunchFailed`], where every request fails fast.
	///
	/// Must be called from within a Tokio runtime.
	pub fn spawn(key: SessionKey, launch: LaunchConfig, events: Option<EventSender>) -> Self {
		let mut cmd = tokio::process::Command::new(&launch.interpreter);
		cmd.args(&launch.args)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped());
		if let Some(dir) = &launch.working_dir {
			cmd.current_dir(dir);
		}

		let mut child = match cmd.spawn() {
			Ok(child) => child,
			Err(e) => return Self::launch_failed(key, launch, e.to_string(), events),
		};

		let (Some(stdin), Some(stdout), Some(stderr)) =
			(child.stdin.take(), child.stdout.take(), child.stderr.take())
		else {
			let _ = child.start_kill();
			return Self::launch_failed(key, launch, "stdio pipes unavailable".to_string(), events);
		};

		let pid = child.id();
		info!(
			target = "nbexec.session",
			key = %key,
			interpreter = %launch.interpreter.display(),
			pid,
			"started interpreter"
		);

		let mut session = Self::start(key, launch, stdin, stdout, events, true);
		session.pid = pid;

		tokio::spawn(read_stderr(stderr, session.shared.key.clone()));

		let shared = Arc::clone(&session.shared);
		tokio::spawn(async move {
			let code = match child.wait().await {
				Ok(status) => {
					info!(target = "nbexec.session", key = %shared.key, %status, "interpreter exited");
					status.code()
				}
				Err(e) => {
					warn!(target = "nbexec.session", key = %shared.key, error = %e, "failed waiting for interpreter");
					None
				}
			};
			shared.exited(code);
		});

		session
	}

	/// Builds a session over already-connected streams.
	///
	/// `stdin` receives request lines; `stdout` is framed into responses.
	/// Lifecycle events are reported when `stdout` ends. Must be called from
	/// within a Tokio runtime.
	pub fn from_streams<W, R>(
		key: SessionKey,
		launch: LaunchConfig,
		stdin: W,
		stdout: R,
		events: Option<EventSender>,
	) -> Self
	where
		W: AsyncWrite + Unpin + Send + 'static,
		R: AsyncRead + Unpin + Send + 'static,
	{
		Self::start(key, launch, stdin, stdout, events, false)
	}

	fn start<W, R>(
		key: SessionKey,
		launch: LaunchConfig,
		stdin: W,
		stdout: R,
		events: Option<EventSender>,
		supervised: bool,
	) -> Self
	where
		W: AsyncWrite + Unpin + Send + 'static,
		R: AsyncRead + Unpin + Send + 'static,
	{
		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		let shared = Arc::new(Shared {
			key,
			pending: PendingRequests::default(),
			state: Mutex::new(SessionState::Running),
			outbound: Mutex::new(Some(outbound_tx)),
			events,
			supervised,
		});

		tokio::spawn(write_stdin(stdin, outbound_rx, shared.key.clone()));
		tokio::spawn(read_stdout(
			stdout,
			FrameBuffer::new(launch.max_frame_bytes),
			Arc::clone(&shared),
		));

		Self {
			shared,
			launch,
			pid: None,
		}
	}

	fn launch_failed(
		key: SessionKey,
		launch: LaunchConfig,
		reason: String,
		events: Option<EventSender>,
	) -> Self {
		error!(
			target = "nbexec.session",
			key = %key,
			interpreter = %launch.interpreter.display(),
			error = %reason,
			"failed to launch interpreter"
		);

		let pending = PendingRequests::default();
		pending.close(&reason, || Error::Protocol(reason.clone()));

		let shared = Arc::new(Shared {
			key,
			pending,
			state: Mutex::new(SessionState::LaunchFailed(reason.clone())),
			outbound: Mutex::new(None),
			events,
			supervised: false,
		});
		shared.emit(SessionEventKind::LaunchFailed { reason });

		Self {
			shared,
			launch,
			pid: None,
		}
	}

	/// Sends `body` and waits for the response carrying the same id.
	///
	/// There is no internal deadline; wrap the call in
	/// `tokio::time::timeout` when bounded latency is required. Dropping the
	/// returned future forgets the request.
	pub async fn request(&self, body: Value) -> Result<Value> {
		self.ensure_running()?;

		let id = Uuid::new_v4().to_string();
		let line = RequestFrame::new(id.as_str(), &body).to_line()?;

		let rx = self.shared.pending.register(self.shared.key.as_str(), &id)?;
		let guard = CancelGuard::new(id.clone(), self.shared.pending.clone());

		let queued = self
			.shared
			.outbound
			.lock()
			.as_ref()
			.is_some_and(|tx| tx.send(line).is_ok());
		if !queued {
			return Err(self.closed_error());
		}

		debug!(target = "nbexec.session", key = %self.shared.key, id = %id, "request queued");

		ResponseFuture {
			rx,
			guard,
			key: self.shared.key.to_string(),
		}
		.await
	}

	/// Sends a typed [`Command`].
	pub async fn send(&self, command: &Command) -> Result<Value> {
		self.request(serde_json::to_value(command)?).await
	}

	/// Closes the interpreter's stdin so it can exit on its own.
	///
	/// Requests already queued are still written first. Does not kill or wait
	/// for the process and leaves pending requests untouched.
	pub fn stop(&self) {
		if self.shared.close_stdin() {
			let mut state = self.shared.state.lock();
			if state.is_running() {
				*state = SessionState::Stopped;
			}
			drop(state);
			info!(target = "nbexec.session", key = %self.shared.key, "stopping interpreter");
		}
	}

	pub fn key(&self) -> &SessionKey {
		&self.shared.key
	}

	pub fn launch_config(&self) -> &LaunchConfig {
		&self.launch
	}

	pub fn state(&self) -> SessionState {
		self.shared.state.lock().clone()
	}

	pub fn is_alive(&self) -> bool {
		self.shared.state.lock().is_running()
	}

	/// OS process id, when backed by a spawned child.
	pub fn pid(&self) -> Option<u32> {
		self.pid
	}

	/// Number of requests awaiting a response.
	pub fn pending_requests(&self) -> usize {
		self.shared.pending.len()
	}

	fn ensure_running(&self) -> Result<()> {
		match &*self.shared.state.lock() {
			SessionState::Running => Ok(()),
			SessionState::LaunchFailed(reason) => Err(Error::LaunchFailed {
				interpreter: self.launch.interpreter.display().to_string(),
				reason: reason.clone(),
			}),
			other => Err(Error::SessionClosed {
				key: self.shared.key.to_string(),
				reason: describe(other),
			}),
		}
	}

	fn closed_error(&self) -> Error {
		Error::SessionClosed {
			key: self.shared.key.to_string(),
			reason: describe(&self.shared.state.lock()),
		}
	}
}

impl Drop for InterpreterSession {
	fn drop(&mut self) {
		self.shared.close_stdin();
	}
}

fn describe(state: &SessionState) -> String {
	match state {
		SessionState::Running => "stdin closed".to_string(),
		SessionState::Stopped => "session stopped".to_string(),
		SessionState::Exited(Some(code)) => format!("interpreter exited with code {code}"),
		SessionState::Exited(None) => "interpreter exited".to_string(),
		SessionState::Faulted(reason) => format!("session faulted: {reason}"),
		SessionState::LaunchFailed(reason) => format!("launch failed: {reason}"),
	}
}

async fn write_stdin<W>(mut stdin: W, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>, key: SessionKey)
where
	W: AsyncWrite + Unpin,
{
	while let Some(line) = outbound.recv().await {
		let written = async {
			stdin.write_all(&line).await?;
			stdin.flush().await
		}
		.await;

		if let Err(e) = written {
			warn!(target = "nbexec.session", key = %key, error = %e, "interpreter stdin write error");
			return;
		}
	}

	if let Err(e) = stdin.shutdown().await {
		debug!(target = "nbexec.session", key = %key, error = %e, "interpreter stdin shutdown error");
	}
	debug!(target = "nbexec.session", key = %key, "interpreter stdin closed");
}

async fn read_stdout<R>(mut stdout: R, mut frames: FrameBuffer, shared: Arc<Shared>)
where
	R: AsyncRead + Unpin,
{
	let mut chunk = vec![0u8; READ_CHUNK_BYTES];

	loop {
		let n = match stdout.read(&mut chunk).await {
			Ok(0) => break,
			Ok(n) => n,
			Err(e) => {
				warn!(target = "nbexec.session", key = %shared.key, error = %e, "interpreter stdout read error");
				break;
			}
		};

		for decoded in frames.push(&chunk[..n]) {
			match decoded {
				Ok(frame) => shared.deliver(frame),
				Err(e) => {
					shared.fault(e);
					return;
				}
			}
		}
	}

	if !frames.is_empty() {
		warn!(
			target = "nbexec.session",
			key = %shared.key,
			bytes = frames.pending_len(),
			"discarding unterminated output at end of stream"
		);
	}
	shared.output_closed();
}

async fn read_stderr<R>(stderr: R, key: SessionKey)
where
	R: AsyncRead + Unpin,
{
	let mut lines = BufReader::new(stderr).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => debug!(target = "nbexec.interpreter", key = %key, "{line}"),
			Ok(None) => break,
			Err(e) => {
				debug!(target = "nbexec.interpreter", key = %key, error = %e, "stderr read error");
				break;
			}
		}
	}
}
