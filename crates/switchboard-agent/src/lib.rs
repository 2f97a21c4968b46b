//! Call worker for the Switchboard platform.
//!
//! One worker process serves one call: it is dispatched into a LiveKit room,
//! loads the assistant configuration that room belongs to, starts a speech
//! agent session with rendered instructions and tool schemas, and records
//! the conversation as it happens. When the caller leaves, the worker stamps
//! the call record and notifies the assistant's end-of-call webhook.
//!
//! The API server owns CRUD and call placement; the worker owns everything
//! that happens inside a live room. The two share the database and the
//! LiveKit deployment, nothing else.

pub mod config;
pub mod error;
pub mod room;
pub mod session;
pub mod template;
pub mod tools;

pub use config::{load_config, ConfigError, WorkerConfig};
pub use error::AgentError;
pub use room::{AgentAction, RoomSession, SessionEvent};
pub use session::{run_call_session, SessionDeps, DEFAULT_GREETING};
pub use tools::{build_session_tools, SessionTool, DEFAULT_WEBHOOK_TIMEOUT_SECS};
