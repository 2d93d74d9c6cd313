//! Concurrent, ambiguity-preserving parse engine
//!
//! Grammars are sets of productions, each an NFA over the grammar's
//! symbols, plus fixed-length terminals. A parse is memoized per
//! (position, symbol) category, runs on a shared worker pool, keeps every
//! derivation of every span, and terminates on left-recursive grammars.
//!
//! # Module Organization
//!
//! ## Grammar Model
//! - [`grammar`] - Symbols, terminals, production NFAs
//! - [`builder`] - Pattern combinators compiled to NFAs
//! - [`regex_cache`] - Compiled terminal patterns
//!
//! ## Parsing
//! - [`matching`] - Categories, classes and matches
//! - [`parser`] - [`ParseEngine`], [`Parse`] and [`ParseOutcome`]
//! - [`asg`] - The abstract syntax graph
//! - [`parallel`] - Batch parsing
//!
//! ## Support
//! - [`document`] - Documents and source positions
//! - [`config`] - Engine configuration
//! - [`error`] - Setup errors and rich diagnostics

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

// ============================================================================
// Module Declarations
// ============================================================================

pub mod asg;
pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod grammar;
pub mod matching;
pub mod parallel;
pub mod parser;
pub mod regex_cache;

mod breaker;
mod dispatcher;
mod scheduler;
mod table;
mod walker;

// ============================================================================
// Core Types
// ============================================================================

pub use asg::{AbstractSyntaxGraph, PossibleError};
pub use config::EngineConfig;
pub use document::{Document, SourcePosition};
pub use grammar::{Grammar, Nfa, StateId, Symbol, SymbolId, SymbolKind, Terminal};
pub use matching::{Match, MatchCategory, MatchClass};
pub use parser::{Parse, ParseEngine, ParseOutcome, ParseStats};

// ============================================================================
// Grammar Construction
// ============================================================================

pub use builder::{GrammarBuilder, Pattern};

// ============================================================================
// Error Handling
// ============================================================================

pub use error::{ErrorBuilder, ParseError, RichError, Span};

// ============================================================================
// Batch Parsing
// ============================================================================

pub use parallel::{parse_batch, ParallelConfig};
