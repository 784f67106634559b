//! epsilon-host — companion tooling for the Eclipse Epsilon languages.
//!
//! Three surfaces:
//! - `run`: launch and supervise the external Epsilon language server,
//!   with a small command loop (`start`/`stop`/`restart`/`sync`/`status`)
//!   and a watch on the config file that offers a restart when it changes;
//! - `new`: scaffold an empty `.egx`/`.egl` pair;
//! - `links` / `open`: extract Epsilon source locations from terminal
//!   output, and jump to one in `$EDITOR`.

mod console;
mod editor;
mod scaffold;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use console::{Console, ConsolePrompter};
use editor::CommandEditor;
use epsilon_links::{match_line, navigate};
use epsilon_lsp::{StartOutcome, Supervisor, SupervisorPaths};

const APP_DIR: &str = "epsilon-host";

#[derive(Parser)]
#[command(name = "epsilon-host", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch and supervise the Epsilon language server.
    Run {
        /// Workspace root announced to the server. Defaults to the
        /// current directory.
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
    /// Create an empty .egx/.egl pair.
    New {
        /// Folder for the new files. Prompted for when omitted, with the
        /// current directory as the suggestion.
        folder: Option<PathBuf>,
    },
    /// Read lines on stdin and print any Epsilon source links, one per
    /// line as `offset <TAB> length <TAB> file:start-end`.
    Links,
    /// Extract the first source link from LINE and open it in $EDITOR.
    Open { line: String },
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && std::fs::create_dir_all(parent).is_err()
        {
            continue;
        }
        let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        else {
            continue;
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
            .with(env_filter)
            .init();
        tracing::debug!(path = %candidate.display(), "logging initialized");
        return;
    }

    // No writable log location; stderr would corrupt prompt output, so
    // logs just go nowhere.
    tracing_subscriber::registry().with(env_filter).init();
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(data) = dirs::data_dir() {
        candidates.push(data.join(APP_DIR).join("logs").join("epsilon-host.log"));
    }
    candidates.push(
        PathBuf::from(format!(".{APP_DIR}"))
            .join("logs")
            .join("epsilon-host.log"),
    );
    candidates
}

/// Filesystem context for the supervisor, derived from the platform
/// config/data directories with a working-directory fallback.
fn supervisor_paths() -> SupervisorPaths {
    let config_file = dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR}")))
        .join("config.toml");
    let storage_dir = dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR}")).join("storage"));
    SupervisorPaths {
        config_file,
        storage_dir,
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Run { workspace } => {
            let workspace = match workspace {
                Some(dir) => dir,
                None => std::env::current_dir().context("resolving current directory")?,
            };
            run_supervised(workspace).await
        }
        Command::New { folder } => new_pair(folder).await,
        Command::Links => print_links().await,
        Command::Open { line } => open_link(&line),
    }
}

/// The supervise loop: sequential, one operation at a time. Prompts and
/// commands share a single console reader.
async fn run_supervised(workspace: PathBuf) -> Result<()> {
    let paths = supervisor_paths();
    let console = Arc::new(Mutex::new(Console::new()));
    let prompter = ConsolePrompter::new(console.clone());
    let mut supervisor = Supervisor::new(paths.clone(), workspace, prompter);

    if let Err(e) = supervisor.start().await {
        eprintln!("error: {e:#}");
    }

    println!("commands: start | stop | restart | status | sync <file> | quit");
    let mut config_stamp = modified_at(&paths.config_file);

    loop {
        let Some(line) = console.lock().await.next_command().await else {
            break;
        };

        supervisor.poll_events();

        // Config edits are observed between commands; the supervisor asks
        // before acting on them.
        let stamp = modified_at(&paths.config_file);
        if stamp != config_stamp {
            config_stamp = stamp;
            if let Err(e) = supervisor.handle_config_change().await {
                eprintln!("error: {e:#}");
            }
        }

        match line.split_once(' ').map_or((line.as_str(), ""), |(a, b)| (a, b)) {
            ("", _) => {}
            ("start", _) => report_start(supervisor.start().await),
            ("stop", _) => supervisor.stop().await,
            ("restart", _) => report_start(supervisor.restart().await),
            ("status", _) => println!("{:?}", supervisor.state()),
            ("sync", file) if !file.is_empty() => {
                match std::fs::read_to_string(file) {
                    Ok(text) => supervisor.document_changed(Path::new(file), &text).await,
                    Err(e) => eprintln!("error: reading {file}: {e}"),
                }
            }
            ("quit" | "exit", _) => break,
            (other, _) => println!("unknown command: {other}"),
        }
    }

    supervisor.stop().await;
    Ok(())
}

fn report_start(result: Result<StartOutcome, epsilon_lsp::SupervisorError>) {
    match result {
        Ok(StartOutcome::Started) => println!("language server running"),
        Ok(StartOutcome::Aborted) => println!("language server not started"),
        Err(e) => eprintln!("error: {e:#}"),
    }
}

/// Scaffold command: both inputs must be present before anything is
/// written; cancelling either prompt writes nothing.
async fn new_pair(folder: Option<PathBuf>) -> Result<()> {
    let mut console = Console::new();

    let folder = match folder {
        Some(folder) => folder,
        None => {
            let suggestion = std::env::current_dir().unwrap_or_default();
            let answer = console
                .ask(&format!(
                    "Folder for the new files [{}]:",
                    suggestion.display()
                ))
                .await;
            match answer {
                None => bail!("no folder path was provided"),
                Some(text) if text.is_empty() => suggestion,
                Some(text) => PathBuf::from(text),
            }
        }
    };

    let name = console
        .ask("Name for the new files (without .egx/.egl):")
        .await
        .filter(|name| !name.is_empty());
    let Some(name) = name else {
        bail!("no file name was provided");
    };

    let pair = scaffold::create_pair(&folder, &name)?;
    println!("created {}", pair.egx.display());
    println!("created {}", pair.egl.display());
    Ok(())
}

/// Terminal-link provider surface: one input line per output link.
async fn print_links() -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if let Some(link) = match_line(&line) {
            let loc = &link.location;
            println!(
                "{}\t{}\t{}:{}:{}-{}:{}",
                link.span.start,
                link.span.length,
                loc.file,
                loc.start_line,
                loc.start_column,
                loc.end_line,
                loc.end_column
            );
        }
    }
    Ok(())
}

fn open_link(line: &str) -> Result<()> {
    let Some(link) = match_line(line) else {
        bail!("no Epsilon source location in the given line");
    };
    let mut editor = CommandEditor::from_env()?;
    navigate(&mut editor, &link.location)
}
