//! Documents and source locations
//!
//! The engine indexes documents by Unicode scalar value, never by byte or
//! UTF-16 unit. [`Document`] decodes text once up front and is cheap to
//! clone, so every task of a parse can hold it.

use std::fmt;
use std::sync::Arc;

/// A document as a shared sequence of code points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    codepoints: Arc<[char]>,
}

impl Document {
    /// Number of code points
    #[inline]
    pub fn len(&self) -> usize {
        self.codepoints.len()
    }

    /// Whether the document is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codepoints.is_empty()
    }

    /// The code points
    #[inline]
    pub fn codepoints(&self) -> &[char] {
        &self.codepoints
    }

    /// Text of the code points in `start..start + length` (clamped)
    pub fn text(&self, start: usize, length: usize) -> String {
        let start = start.min(self.len());
        let end = start.saturating_add(length).min(self.len());
        self.codepoints[start..end].iter().collect()
    }

    /// Line and column of a code point offset
    pub fn position(&self, offset: usize) -> SourcePosition {
        let offset = offset.min(self.len());
        let mut line = 1;
        let mut column = 1;

        for &c in &self.codepoints[..offset] {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        SourcePosition {
            offset,
            line,
            column,
        }
    }

    /// The full line containing `offset`, without its line terminator
    pub fn line_at(&self, offset: usize) -> String {
        let offset = offset.min(self.len());
        let start = self.codepoints[..offset]
            .iter()
            .rposition(|&c| c == '\n')
            .map(|n| n + 1)
            .unwrap_or(0);
        let end = self.codepoints[offset..]
            .iter()
            .position(|&c| c == '\n')
            .map(|n| offset + n)
            .unwrap_or(self.len());
        self.codepoints[start..end].iter().collect()
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self {
            codepoints: text.chars().collect(),
        }
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

impl From<Vec<char>> for Document {
    fn from(codepoints: Vec<char>) -> Self {
        Self {
            codepoints: codepoints.into(),
        }
    }
}

/// A position in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Code point offset from the start of the document
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in code points)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl Default for SourcePosition {
    fn default() -> Self {
        Self::new(0, 1, 1)
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
