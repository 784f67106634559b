//! Client for the external Epsilon language server.
//!
//! This crate owns the lifecycle of at most one `epsilon-ls.jar` process:
//! locating the artifact, spawning `java -jar`, the LSP handshake over the
//! child's standard streams, and graceful shutdown. All language
//! intelligence lives in the server; this is transport and supervision.

pub mod codec;
pub mod types;

pub(crate) mod protocol;
pub(crate) mod server;

mod locator;
mod supervisor;

pub use locator::{LocateError, LocateOutcome, resolve_artifact};
pub use supervisor::{StartOutcome, Supervisor, SupervisorError, SupervisorPaths};
pub use types::{
    HostConfig, HostConfigError, HostPrompter, NotFoundChoice, RestartChoice, SessionEvent,
    SupervisorState, LANGUAGE_ID, SERVER_JAR_NAME,
};
