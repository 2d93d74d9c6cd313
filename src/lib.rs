//! Ambiparse - Concurrent, Ambiguity-Preserving Parse Engine
//!
//! This is a parse engine for grammars whose productions are NFAs over
//! terminals and other productions. It provides:
//! - Memoization per (position, symbol), shared by every derivation
//! - Every derivation of every span, as an abstract syntax graph
//! - Termination on left-recursive and cyclic grammars
//! - Greedy productions that report only their longest match
//! - Parallel work on a shared thread pool
//! - Ranked possible errors and rich error reports for failed parses
//!
//! ## Quick Start
//!
//! ```rust
//! use ambiparse::prelude::*;
//! use std::sync::Arc;
//!
//! // expr := expr '+' expr | digit
//! let mut b = GrammarBuilder::new();
//! let digit = b.terminal("digit", Terminal::range('0', '9'));
//! let plus = b.literal("+");
//! let expr = b.declare("expr");
//! b.define(expr, choice([seq([sym(expr), sym(plus), sym(expr)]), sym(digit)]));
//! let grammar = Arc::new(b.build().unwrap());
//!
//! let engine = ParseEngine::new(grammar, EngineConfig::default()).unwrap();
//! let outcome = engine.parse("1+2+3", expr, None).unwrap().join();
//!
//! // (1+2)+3 and 1+(2+3)
//! let asg = outcome.abstract_syntax_graph();
//! assert_eq!(asg.get(&asg.root()).unwrap().len(), 2);
//! ```
//!
//! ## Grammars as JSON
//!
//! ```rust
//! use ambiparse::prelude::*;
//!
//! let mut b = GrammarBuilder::new();
//! let a = b.literal("a");
//! b.production("as", star(sym(a)));
//! let grammar = b.build().unwrap();
//!
//! let json = grammar.to_json().unwrap();
//! assert_eq!(Grammar::from_json(&json).unwrap(), grammar);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

// Prelude module for convenient imports
pub mod prelude;

// The engine
pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    // Batch parsing
    parallel::{parse_batch, ParallelConfig},
    // Rich errors
    error::{ErrorBuilder, RichError, Span},
    AbstractSyntaxGraph,
    Document,
    EngineConfig,
    Grammar,
    GrammarBuilder,
    Match,
    MatchCategory,
    MatchClass,
    Parse,
    ParseEngine,
    ParseError,
    ParseOutcome,
    SymbolId,
    Terminal,
};
