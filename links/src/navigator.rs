//! Link activation: open the referenced document and reveal the range.

use std::path::Path;

use anyhow::{Context, Result};

use crate::matcher::SourceLocation;

/// A 0-based position within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// A 0-based selection range within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// The editor side of link activation.
///
/// Implementations open files as documents and move the viewport; the
/// navigator stays editor-agnostic.
pub trait EditorHost {
    type DocumentId;

    /// Open `path` as a document. Failure to open is an error for the
    /// caller to surface, not to swallow.
    fn open_document(&mut self, path: &Path) -> Result<Self::DocumentId>;

    /// Select `range` in the document and scroll it into view.
    fn reveal(&mut self, document: &Self::DocumentId, range: Range) -> Result<()>;
}

/// Activate a matched link: open its file and reveal the referenced range.
///
/// The textual encoding is 1-based for lines and 0-based for columns;
/// the editor range produced here is 0-based throughout.
pub fn navigate<H: EditorHost>(host: &mut H, location: &SourceLocation) -> Result<()> {
    let document = host
        .open_document(Path::new(&location.file))
        .with_context(|| format!("opening {}", location.file))?;

    let range = Range {
        start: Position {
            line: location.start_line.saturating_sub(1),
            character: location.start_column,
        },
        end: Position {
            line: location.end_line.saturating_sub(1),
            character: location.end_column,
        },
    };

    tracing::debug!(file = %location.file, ?range, "navigating to link target");
    host.reveal(&document, range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::path::PathBuf;

    /// Records open/reveal calls; optionally refuses to open.
    struct RecordingHost {
        openable: bool,
        opened: Vec<PathBuf>,
        revealed: Vec<(PathBuf, Range)>,
    }

    impl RecordingHost {
        fn new(openable: bool) -> Self {
            Self {
                openable,
                opened: Vec::new(),
                revealed: Vec::new(),
            }
        }
    }

    impl EditorHost for RecordingHost {
        type DocumentId = PathBuf;

        fn open_document(&mut self, path: &Path) -> Result<PathBuf> {
            if !self.openable {
                bail!("cannot open {}", path.display());
            }
            self.opened.push(path.to_path_buf());
            Ok(path.to_path_buf())
        }

        fn reveal(&mut self, document: &PathBuf, range: Range) -> Result<()> {
            self.revealed.push((document.clone(), range));
            Ok(())
        }
    }

    fn location() -> SourceLocation {
        SourceLocation {
            file: "/tmp/foo.egl".to_string(),
            start_line: 3,
            start_column: 2,
            end_line: 3,
            end_column: 10,
        }
    }

    #[test]
    fn opens_and_reveals_zero_based_range() {
        let mut host = RecordingHost::new(true);
        navigate(&mut host, &location()).unwrap();

        assert_eq!(host.opened, vec![PathBuf::from("/tmp/foo.egl")]);
        let (doc, range) = &host.revealed[0];
        assert_eq!(doc, &PathBuf::from("/tmp/foo.egl"));
        // Lines shift from 1-based to 0-based; columns are already 0-based.
        assert_eq!(range.start, Position { line: 2, character: 2 });
        assert_eq!(range.end, Position { line: 2, character: 10 });
    }

    #[test]
    fn open_failure_propagates_without_reveal() {
        let mut host = RecordingHost::new(false);
        let err = navigate(&mut host, &location()).unwrap_err();
        assert!(err.to_string().contains("/tmp/foo.egl"));
        assert!(host.revealed.is_empty());
    }

    #[test]
    fn line_zero_does_not_underflow() {
        let mut host = RecordingHost::new(true);
        let mut loc = location();
        loc.start_line = 0;
        loc.end_line = 0;
        navigate(&mut host, &loc).unwrap();
        assert_eq!(host.revealed[0].1.start.line, 0);
        assert_eq!(host.revealed[0].1.end.line, 0);
    }
}
