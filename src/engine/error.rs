//! Errors and rich diagnostics
//!
//! Two kinds of failure exist. [`ParseError`] covers recoverable setup
//! problems (bad range, bad grammar, pool construction). A document that
//! does not conform to the grammar is not an error at all: the parse simply
//! produces an empty graph, and [`RichError`] renders the engine's
//! possible-error categories for humans.
//!
//! # Example Output
//!
//! ```text
//! Error at line 1, column 3:
//! 3+
//!   ^
//! `- Failed to match sum
//!    `- Expected digit
//! ```

use super::document::{Document, SourcePosition};
use std::fmt;

/// Error type for engine setup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Requested range does not lie within the document
    RangeOutOfBounds {
        /// First code point of the range
        start: usize,
        /// Length of the range in code points
        length: usize,
        /// Length of the document in code points
        document_length: usize,
    },

    /// Input exceeds the configured maximum size
    InputTooLarge {
        /// Size of the input in code points
        input_size: usize,
        /// Maximum allowed size
        max_size: usize,
    },

    /// Root symbol is not part of the grammar
    UnknownSymbol {
        /// The offending id
        id: u32,
    },

    /// Invalid grammar definition
    InvalidGrammar {
        /// Reason why the grammar is invalid
        reason: String,
    },

    /// The worker pool could not be created
    ThreadPool {
        /// Error message from the pool builder
        message: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::RangeOutOfBounds {
                start,
                length,
                document_length,
            } => {
                write!(
                    f,
                    "Range {}..{} is outside a document of {} code points",
                    start,
                    start.saturating_add(*length),
                    document_length
                )
            }
            ParseError::InputTooLarge {
                input_size,
                max_size,
            } => {
                write!(
                    f,
                    "Input too large: {} code points exceeds limit of {}",
                    input_size, max_size
                )
            }
            ParseError::UnknownSymbol { id } => {
                write!(f, "Unknown symbol #{}", id)
            }
            ParseError::InvalidGrammar { reason } => {
                write!(f, "Invalid grammar: {}", reason)
            }
            ParseError::ThreadPool { message } => {
                write!(f, "Thread pool error: {}", message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A range in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start position
    pub start: SourcePosition,
    /// End position
    pub end: SourcePosition,
}

impl Span {
    /// Create a span at a single position
    pub fn at(offset: usize, line: usize, column: usize) -> Self {
        let pos = SourcePosition::new(offset, line, column);
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Create a span covering `start..end` of a document
    pub fn of(document: &Document, start: usize, end: usize) -> Self {
        Self {
            start: document.position(start),
            end: document.position(end),
        }
    }

    /// Merge two spans into one covering both
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: if self.start.offset <= other.start.offset {
                self.start
            } else {
                other.start
            },
            end: if self.end.offset >= other.end.offset {
                self.end
            } else {
                other.end
            },
        }
    }
}

/// A rich, tree-structured parse diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichError {
    /// The error message
    pub message: String,
    /// Where the error occurred
    pub span: Span,
    /// What was being parsed (e.g. a production name)
    pub context: Option<String>,
    /// Child errors (causes)
    pub children: Vec<RichError>,
}

impl RichError {
    /// Create a new error at a span
    pub fn at(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            context: None,
            children: Vec::new(),
        }
    }

    /// Create an "expected" error
    pub fn expected(expected: &str, span: Span) -> Self {
        Self::at(format!("Expected {}", expected), span)
    }

    /// Create a "failed to match" error
    pub fn failed_to_match(what: &str, span: Span) -> Self {
        Self::at(format!("Failed to match {}", what), span)
    }

    /// Get the deepest error position
    pub fn deepest_position(&self) -> Span {
        self.children
            .iter()
            .map(|c| c.deepest_position())
            .filter(|s| s.start.offset > self.span.start.offset)
            .max_by_key(|s| s.start.offset)
            .unwrap_or(self.span)
    }

    /// Format as ASCII tree
    pub fn ascii_tree(&self) -> String {
        let mut output = String::new();
        self.ascii_tree_impl(&mut output, "", true);
        output
    }

    fn ascii_tree_impl(&self, output: &mut String, prefix: &str, last: bool) {
        let connector = if last { "`- " } else { "|- " };
        let child_prefix = if last { "   " } else { "|  " };

        output.push_str(prefix);
        output.push_str(connector);
        output.push_str(&self.message);

        if let Some(ref ctx) = self.context {
            output.push_str(&format!(" (in {})", ctx));
        }

        output.push('\n');

        for (i, child) in self.children.iter().enumerate() {
            let is_last = i == self.children.len() - 1;
            child.ascii_tree_impl(output, &format!("{}{}", prefix, child_prefix), is_last);
        }
    }

    /// Format with the offending source line and a caret
    pub fn format_with_source(&self, document: &Document) -> String {
        let pos = self.deepest_position().start;
        let mut output = format!("Error at {}:\n", pos);

        output.push_str(&document.line_at(pos.offset));
        output.push('\n');
        output.push_str(&" ".repeat(pos.column.saturating_sub(1)));
        output.push_str("^\n");

        output.push_str(&self.ascii_tree());
        output
    }
}

impl fmt::Display for RichError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error at {}: {}", self.span.start, self.message)
    }
}

impl std::error::Error for RichError {}

/// Error builder for constructing rich errors
pub struct ErrorBuilder {
    message: String,
    span: Span,
    context: Option<String>,
    children: Vec<RichError>,
}

impl ErrorBuilder {
    /// Create a new error builder
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: Span::at(0, 1, 1),
            context: None,
            children: Vec::new(),
        }
    }

    /// Set the span
    pub fn span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Set position
    pub fn at(mut self, offset: usize, line: usize, column: usize) -> Self {
        self.span = Span::at(offset, line, column);
        self
    }

    /// Set context
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Add a child error
    pub fn child(mut self, child: RichError) -> Self {
        self.children.push(child);
        self
    }

    /// Build the error
    pub fn build(self) -> RichError {
        RichError {
            message: self.message,
            span: self.span,
            context: self.context,
            children: self.children,
        }
    }
}
