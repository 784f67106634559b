//! Public types at the boundary between the supervisor and its host.
//!
//! The host constructs a [`HostConfig`] (or lets the supervisor reload it
//! from disk), implements [`HostPrompter`] for the user-facing questions,
//! and observes [`SupervisorState`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default artifact filename expected under the persistent storage dir.
pub const SERVER_JAR_NAME: &str = "epsilon-ls.jar";

/// LSP language identifier the session is scoped to.
pub const LANGUAGE_ID: &str = "eol";

/// File extension of documents synced to the server.
pub(crate) const SYNCED_EXTENSION: &str = "eol";

const DEFAULT_JAVA: &str = "java";

/// Host configuration, read from a TOML file.
///
/// Every field is optional; an absent file is an empty configuration.
/// Reloaded from disk on every start/restart so edits take effect without
/// restarting the host process.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    /// Override path to the server jar. Empty or unset means "use the
    /// default location under the storage directory".
    #[serde(default)]
    pub server_path: Option<PathBuf>,
    /// Java runtime used to launch the jar. Defaults to `java` from PATH.
    #[serde(default)]
    pub java_path: Option<String>,
    /// Forwarded to the server at initialization. Unset means unbounded.
    #[serde(default)]
    pub max_number_of_problems: Option<u32>,
}

impl HostConfig {
    /// Load configuration from `path`. A missing file yields the default
    /// (empty) configuration; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, HostConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(HostConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&text).map_err(|source| HostConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Effective Java runtime command.
    #[must_use]
    pub fn java(&self) -> &str {
        self.java_path.as_deref().unwrap_or(DEFAULT_JAVA)
    }

    /// The server-path override, treating an empty string as unset.
    #[must_use]
    pub fn server_path_override(&self) -> Option<&Path> {
        self.server_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Lifecycle state of the supervised server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Answer to the "server artifact not found" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundChoice {
    /// Surface the settings so the user can set an override path.
    OpenSettings,
    /// Look for the artifact again.
    Retry,
    /// Prompt dismissed; give up on this start attempt.
    Dismissed,
}

/// Answer to the "configuration changed, restart?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartChoice {
    Restart,
    Keep,
    Dismissed,
}

/// User-facing prompts the supervisor can raise.
///
/// Each is an async request/response; the answer drives the supervisor's
/// next step. Prompts can always be dismissed, which aborts the operation
/// cleanly.
pub trait HostPrompter {
    /// The server jar was not found at `searched`.
    fn artifact_not_found(
        &mut self,
        searched: &Path,
    ) -> impl Future<Output = NotFoundChoice> + Send;

    /// Configuration changed while a session may be live; restart?
    fn confirm_restart(&mut self) -> impl Future<Output = RestartChoice> + Send;

    /// The user asked to edit settings; show them where.
    fn open_settings(&mut self, config_file: &Path) -> impl Future<Output = ()> + Send;
}

/// Events emitted by the session's reader task.
#[derive(Debug)]
pub enum SessionEvent {
    /// The server closed its stdout (clean exit).
    Exited,
    /// The transport failed.
    Failed(String),
}
