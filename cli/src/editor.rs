//! Link activation against a real editor: `$EDITOR +line file`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use epsilon_links::{EditorHost, Range};

/// Opens link targets in the editor named by `$EDITOR` (or `$VISUAL`).
pub struct CommandEditor {
    editor: String,
}

impl CommandEditor {
    /// Resolve the editor command from the environment.
    pub fn from_env() -> Result<Self> {
        let editor = std::env::var("EDITOR")
            .or_else(|_| std::env::var("VISUAL"))
            .context("neither $EDITOR nor $VISUAL is set")?;
        Ok(Self { editor })
    }
}

impl EditorHost for CommandEditor {
    type DocumentId = PathBuf;

    fn open_document(&mut self, path: &Path) -> Result<PathBuf> {
        // Fail here, not inside the editor, when the target is unopenable.
        std::fs::metadata(path).with_context(|| format!("cannot open {}", path.display()))?;
        Ok(path.to_path_buf())
    }

    fn reveal(&mut self, document: &PathBuf, range: Range) -> Result<()> {
        // Editors take 1-based lines on the command line.
        let line_arg = format!("+{}", range.start.line + 1);
        let status = std::process::Command::new(&self.editor)
            .arg(line_arg)
            .arg(document)
            .status()
            .with_context(|| format!("launching {}", self.editor))?;
        if !status.success() {
            bail!("{} exited with {status}", self.editor);
        }
        Ok(())
    }
}
