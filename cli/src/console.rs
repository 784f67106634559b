//! Console implementations of the host boundaries: user prompts over
//! stdin/stdout, shared between the supervisor and the command loop so
//! there is exactly one reader of stdin.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use epsilon_lsp::{HostPrompter, NotFoundChoice, RestartChoice};

/// Line-oriented console. All stdin reads in the process go through one
/// instance of this.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `question` and read one answer line. `None` means EOF, which
    /// callers treat as a dismissed prompt.
    pub async fn ask(&mut self, question: &str) -> Option<String> {
        println!("{question}");
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("reading console input: {e}");
                None
            }
        }
    }

    /// Read the next command line without printing a question. `None` on EOF.
    pub async fn next_command(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Some(line.trim().to_string()),
            Ok(None) | Err(_) => None,
        }
    }
}

/// Supervisor prompts rendered as console questions.
///
/// Holds the console behind a mutex so the command loop and the prompts
/// never compete for stdin bytes.
#[derive(Clone)]
pub struct ConsolePrompter {
    console: Arc<Mutex<Console>>,
}

impl ConsolePrompter {
    #[must_use]
    pub fn new(console: Arc<Mutex<Console>>) -> Self {
        Self { console }
    }
}

impl HostPrompter for ConsolePrompter {
    async fn artifact_not_found(&mut self, searched: &Path) -> NotFoundChoice {
        let question = format!(
            "Epsilon language server not found at {}.\n  [s] open settings  [r] retry  [enter] cancel",
            searched.display()
        );
        let answer = self.console.lock().await.ask(&question).await;
        match answer.as_deref() {
            Some("s" | "S") => NotFoundChoice::OpenSettings,
            Some("r" | "R") => NotFoundChoice::Retry,
            _ => NotFoundChoice::Dismissed,
        }
    }

    async fn confirm_restart(&mut self) -> RestartChoice {
        let answer = self
            .console
            .lock()
            .await
            .ask("Configuration changed. Restart the language server? [y/n]")
            .await;
        match answer.as_deref() {
            Some("y" | "Y" | "yes") => RestartChoice::Restart,
            Some("n" | "N" | "no") => RestartChoice::Keep,
            _ => RestartChoice::Dismissed,
        }
    }

    async fn open_settings(&mut self, config_file: &Path) {
        println!(
            "Set `server_path` in {} and run `restart`.",
            config_file.display()
        );
    }
}
