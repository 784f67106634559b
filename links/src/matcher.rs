//! Source-location extraction from terminal text.
//!
//! Epsilon interpreters report program locations in the form
//! `(path/to/script.egl@3:2-3:10)` — file, then 1-based start line and
//! 0-based start column, then end line and column. The matcher finds the
//! first such reference on a line and reports both the parsed location and
//! where the reference sits within the line, so the host can render that
//! slice as a clickable region.

use std::sync::LazyLock;

use regex::Regex;

/// Matches `(<file>@<line>:<col>-<line>:<col>)`. The outer group (`span`)
/// excludes the parentheses; that is the substring rendered as the link.
static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((?<span>(?<file>.*?)@(?<sl>\d+):(?<sc>\d+)-(?<el>\d+):(?<ec>\d+))\)")
        .expect("location pattern is valid")
});

/// A source range referenced by terminal output.
///
/// Lines are 1-based as printed; columns are 0-based. Consumers subtract 1
/// from the lines before handing the range to an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// Where a matched reference sits within its line, in characters.
///
/// Character offsets (not byte offsets) so hosts that index rendered
/// terminal cells can use them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpan {
    pub start: usize,
    pub length: usize,
}

/// One clickable link extracted from a terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLink {
    pub location: SourceLocation,
    pub span: LinkSpan,
}

/// Extract the first Epsilon source-location reference from `line`.
///
/// Pure and total: arbitrary input yields `None`, never an error. Only the
/// first reference per line is reported. Numeric fields that overflow
/// `u32` are treated as no match.
#[must_use]
pub fn match_line(line: &str) -> Option<TerminalLink> {
    let caps = LOCATION.captures(line)?;

    let number = |name: &str| caps.name(name)?.as_str().parse::<u32>().ok();
    let location = SourceLocation {
        file: caps.name("file")?.as_str().to_string(),
        start_line: number("sl")?,
        start_column: number("sc")?,
        end_line: number("el")?,
        end_column: number("ec")?,
    };

    let span = caps.name("span")?;
    Some(TerminalLink {
        location,
        span: LinkSpan {
            start: line[..span.start()].chars().count(),
            length: span.as_str().chars().count(),
        },
    })
}
