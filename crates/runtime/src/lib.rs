//! nbexec runtime - interpreter supervision, framing, and session registry
//!
//! This crate runs one long-lived interpreter process per document and talks
//! to it over newline-delimited JSON on its standard streams:
//!
//! - **Framing**: splitting streamed stdout into response frames
//! - **Session**: process ownership, request/response correlation by id
//! - **Registry**: per-document sessions, reuse vs replacement on config change
//! - **Script**: locating the companion script the interpreter runs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ integration layer│  document key + effective interpreter path
//! └────────┬─────────┘
//!          │ get_or_create / remove_and_stop / dispose_all
//! ┌────────▼─────────┐
//! │ SessionRegistry  │  key → Arc<InterpreterSession>
//! └────────┬─────────┘
//!          │ Launcher
//! ┌────────▼─────────┐
//! │InterpreterSession│  pending ids, writer/reader tasks
//! └────────┬─────────┘
//!          │ stdin / stdout / stderr
//! ┌────────▼─────────┐
//! │ interpreter      │  <python> <script> <key>
//! └──────────────────┘
//! ```

pub mod error;
pub mod event;
pub mod framing;
mod key;
pub mod launcher;
pub mod registry;
pub mod script;
pub mod session;

pub use error::{Error, Result};
pub use event::{EventReceiver, EventSender, SessionEvent, SessionEventKind, SessionState};
pub use framing::{DEFAULT_MAX_FRAME_BYTES, FrameBuffer};
pub use key::SessionKey;
pub use launcher::{LaunchConfig, Launcher, ProcessLauncher};
pub use nbexec_protocol::{Command, RequestFrame, ResponseFrame};
pub use registry::{SessionRegistry, SessionTemplate};
pub use script::locate_script;
pub use session::InterpreterSession;
