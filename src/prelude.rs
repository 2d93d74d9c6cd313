//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from ambiparse.
//! Importing this module with a wildcard import brings the core types into scope:
//!
//! ```
//! use ambiparse::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`Grammar`] - Symbols and production NFAs
//! - [`ParseEngine`] - Grammar plus worker pool
//! - [`ParseOutcome`] - Result of a finished parse
//! - [`AbstractSyntaxGraph`] - Every derivation of the root span
//!
//! ## Grammar Construction
//! - [`GrammarBuilder`] - Builder for constructing grammars
//! - [`sym()`], [`seq()`], [`choice()`], [`star()`], [`plus()`], [`opt()`],
//!   [`empty()`] - Pattern combinators
//!
//! ## Error Handling
//! - [`ParseError`] - Setup errors
//! - [`RichError`] - Rich, tree-structured diagnostic

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::{
    AbstractSyntaxGraph, Document, EngineConfig, Grammar, Match, MatchCategory, MatchClass,
    Parse, ParseEngine, ParseOutcome, ParseStats, PossibleError, SymbolId, Terminal,
};

// ============================================================================
// Grammar Construction
// ============================================================================

pub use crate::engine::builder::{
    choice, empty, opt, plus, seq, star, sym, GrammarBuilder, Pattern,
};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::engine::error::{ErrorBuilder, ParseError, RichError, Span};

// ============================================================================
// Batch Parsing
// ============================================================================

pub use crate::engine::parallel::{parse_batch, ParallelConfig};
