//! Terminal hyperlink extraction and navigation for Epsilon source locations.
//!
//! Epsilon tools print program locations as `(file@line:col-line:col)`.
//! [`match_line`] turns one line of terminal output into a clickable
//! [`TerminalLink`]; [`navigate`] resolves a clicked link against an
//! [`EditorHost`].

mod matcher;
mod navigator;

pub use matcher::{LinkSpan, SourceLocation, TerminalLink, match_line};
pub use navigator::{EditorHost, Position, Range, navigate};
