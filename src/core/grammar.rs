//! Lexical rules of the inline command language.
//!
//! ```text
//! inline-invocation ::= MARKER identifier SPACE argument-line
//! block-invocation  ::= MARKER identifier SPACE path-argument SPACE "<<<" body ">>>"
//! ```
//!
//! A marker only counts at the start of a line (indentation allowed) and must
//! be followed directly by a lowercase identifier ending at whitespace or end
//! of line. `\` before the marker makes the line plain text.

use crate::core::command::CommandName;
use crate::core::error::ParleyError;

pub const BLOCK_OPEN: &str = "<<<";
pub const BLOCK_CLOSE: &str = ">>>";
pub const ESCAPE: char = '\\';
pub const DEFAULT_MARKER: char = '@';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grammar {
    pub marker: char,
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER,
        }
    }
}

/// Classification of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineToken<'a> {
    Text,
    Marker {
        /// Byte offset of the marker within the line.
        marker_offset: usize,
        name: &'a str,
        rest: &'a str,
        /// Byte offset of `rest` within the line.
        rest_offset: usize,
    },
}

/// One line of source text with absolute byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine {
    pub start: usize,
    /// End of the content, excluding `\r\n` / `\n`.
    pub end: usize,
    /// Start of the following line (or text length).
    pub next: usize,
}

impl Grammar {
    pub fn new(marker: char) -> Result<Self, ParleyError> {
        if marker.is_alphanumeric()
            || marker.is_whitespace()
            || matches!(marker, '\\' | '<' | '>' | '-' | '"' | '\'')
        {
            return Err(ParleyError::ConfigError(format!(
                "'{}' cannot be used as a command marker",
                marker.escape_default()
            )));
        }
        Ok(Self { marker })
    }

    /// `@name` for display.
    pub fn token(&self, name: &str) -> String {
        format!("{}{}", self.marker, name)
    }

    pub fn usage(&self, command: CommandName) -> String {
        format!("{}{}", self.marker, command.synopsis())
    }

    pub fn classify<'a>(&self, line: &'a str) -> LineToken<'a> {
        let content = line.trim_start_matches([' ', '\t']);
        let indent = line.len() - content.len();
        if !content.starts_with(self.marker) {
            return LineToken::Text;
        }
        let after_marker = &content[self.marker.len_utf8()..];
        let ident_len = identifier_len(after_marker);
        if ident_len == 0 {
            return LineToken::Text;
        }
        let rest = &after_marker[ident_len..];
        if !(rest.is_empty() || rest.starts_with([' ', '\t'])) {
            return LineToken::Text;
        }
        LineToken::Marker {
            marker_offset: indent,
            name: &after_marker[..ident_len],
            rest,
            rest_offset: indent + self.marker.len_utf8() + ident_len,
        }
    }

    /// True when `line` opens an invocation of a known command.
    pub fn starts_known_command(&self, line: &str) -> Option<CommandName> {
        match self.classify(line) {
            LineToken::Marker { name, .. } => CommandName::from_name(name),
            LineToken::Text => None,
        }
    }
}

fn identifier_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    if bytes.first().is_none_or(|b| !b.is_ascii_lowercase()) {
        return 0;
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || **b == b'-')
        .count()
}

pub fn split_lines(text: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut start = 0;
    for piece in text.split_inclusive('\n') {
        let next = start + piece.len();
        let content = piece.strip_suffix('\n').unwrap_or(piece);
        let content = content.strip_suffix('\r').unwrap_or(content);
        lines.push(SourceLine {
            start,
            end: start + content.len(),
            next,
        });
        start = next;
    }
    lines
}

/// Index of the line containing byte `offset`.
pub fn line_index_of(lines: &[SourceLine], offset: usize) -> usize {
    lines
        .partition_point(|line| line.next <= offset)
        .min(lines.len().saturating_sub(1))
}
