//! Process supervisor — exclusive owner of at most one server session.
//!
//! The raw session handle is never exposed; hosts drive the lifecycle
//! through `start`/`stop`/`restart` and observe [`SupervisorState`].
//! Operations take `&mut self`, so they cannot overlap — there is no
//! window where two start attempts race.
//!
//! State transitions: `Stopped → Starting → Running → Stopping → Stopped`.
//! The effective jar path is recomputed on every attempt so configuration
//! edits take effect on restart.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::locator::{self, LocateError, LocateOutcome};
use crate::server::ServerHandle;
use crate::types::{
    HostConfig, HostConfigError, HostPrompter, NotFoundChoice, RestartChoice, SessionEvent,
    SupervisorState, SYNCED_EXTENSION,
};

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Filesystem context the supervisor operates against. Passed in
/// explicitly; the supervisor holds no ambient global state.
#[derive(Debug, Clone)]
pub struct SupervisorPaths {
    /// TOML config file, reloaded on every start attempt.
    pub config_file: PathBuf,
    /// Persistent storage directory holding the default jar location.
    pub storage_dir: PathBuf,
}

/// How a start attempt ended when it didn't fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Session is up and initialized.
    Started,
    /// The user dismissed a prompt or went to settings; no session.
    Aborted,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] HostConfigError),
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error("launching language server: {0:#}")]
    Launch(anyhow::Error),
}

/// Owns the lifecycle of the external Epsilon language server.
pub struct Supervisor<P> {
    paths: SupervisorPaths,
    workspace_root: PathBuf,
    prompter: P,
    state: SupervisorState,
    session: Option<ServerHandle>,
    events: Option<mpsc::Receiver<SessionEvent>>,
}

impl<P: HostPrompter> Supervisor<P> {
    #[must_use]
    pub fn new(paths: SupervisorPaths, workspace_root: PathBuf, prompter: P) -> Self {
        Self {
            paths,
            workspace_root,
            prompter,
            state: SupervisorState::Stopped,
            session: None,
            events: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Start the server, stopping any live session first so at most one
    /// instance ever exists.
    ///
    /// When the jar cannot be located the not-found prompt fires exactly
    /// once per attempt; "retry" loops into a fresh attempt, every other
    /// answer aborts cleanly. Spawn or handshake failures return an error
    /// with the state back at `Stopped` — never partially running.
    pub async fn start(&mut self) -> Result<StartOutcome, SupervisorError> {
        if self.session.is_some() {
            self.stop().await;
        }

        self.state = SupervisorState::Starting;
        let result = self.run_start_attempts().await;
        self.state = match &result {
            Ok(StartOutcome::Started) => SupervisorState::Running,
            Ok(StartOutcome::Aborted) | Err(_) => SupervisorState::Stopped,
        };
        result
    }

    async fn run_start_attempts(&mut self) -> Result<StartOutcome, SupervisorError> {
        loop {
            let config = HostConfig::load(&self.paths.config_file)?;
            match locator::resolve_artifact(&config, &self.paths.storage_dir)? {
                LocateOutcome::Found(jar) => {
                    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
                    let session = ServerHandle::launch(
                        config.java(),
                        &jar,
                        &self.workspace_root,
                        config.max_number_of_problems,
                        event_tx,
                    )
                    .await
                    .map_err(SupervisorError::Launch)?;

                    tracing::info!(jar = %jar.display(), "language server started");
                    self.session = Some(session);
                    self.events = Some(event_rx);
                    return Ok(StartOutcome::Started);
                }
                LocateOutcome::NotFound { searched } => {
                    tracing::warn!(path = %searched.display(), "server artifact not found");
                    match self.prompter.artifact_not_found(&searched).await {
                        NotFoundChoice::Retry => {}
                        NotFoundChoice::OpenSettings => {
                            self.prompter.open_settings(&self.paths.config_file).await;
                            return Ok(StartOutcome::Aborted);
                        }
                        NotFoundChoice::Dismissed => return Ok(StartOutcome::Aborted),
                    }
                }
            }
        }
    }

    /// Gracefully stop the live session. No-op when already stopped.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.state = SupervisorState::Stopping;
        session.shutdown().await;
        self.events = None;
        self.state = SupervisorState::Stopped;
        tracing::info!("language server stopped");
    }

    /// Stop-then-start as one logical operation.
    pub async fn restart(&mut self) -> Result<StartOutcome, SupervisorError> {
        self.stop().await;
        self.start().await
    }

    /// React to a configuration change: ask before restarting. Declining
    /// (or dismissing) leaves any live session untouched.
    pub async fn handle_config_change(&mut self) -> Result<(), SupervisorError> {
        match self.prompter.confirm_restart().await {
            RestartChoice::Restart => {
                self.restart().await?;
                Ok(())
            }
            RestartChoice::Keep | RestartChoice::Dismissed => {
                tracing::debug!("configuration change acknowledged without restart");
                Ok(())
            }
        }
    }

    /// Forward a document's current text to the server. Only documents of
    /// the server's language are synced; everything else is ignored, as is
    /// any document while no session is running.
    pub async fn document_changed(&mut self, path: &Path, text: &str) {
        if path.extension().and_then(|e| e.to_str()) != Some(SYNCED_EXTENSION) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.sync_document(path, text).await {
            tracing::warn!("failed to sync {}: {e:#}", path.display());
        }
    }

    /// Drain session events. If the server died behind our back the
    /// session is dropped and the state returns to `Stopped`. Non-blocking.
    pub fn poll_events(&mut self) -> usize {
        let Some(events) = self.events.as_mut() else {
            return 0;
        };

        let mut count = 0;
        let mut session_over = false;
        loop {
            match events.try_recv() {
                Ok(SessionEvent::Exited) => {
                    tracing::info!("language server exited");
                    session_over = true;
                    count += 1;
                }
                Ok(SessionEvent::Failed(message)) => {
                    tracing::warn!(error = %message, "language server failed");
                    session_over = true;
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }

        if session_over {
            self.session = None;
            self.events = None;
            self.state = SupervisorState::Stopped;
        }
        count
    }

    /// Install an event channel without a session (for testing).
    #[cfg(test)]
    fn install_event_channel(&mut self) -> mpsc::Sender<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.events = Some(rx);
        tx
    }
}
