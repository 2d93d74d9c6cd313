//! Batch parsing
//!
//! Parses of independent documents share the engine's pool, so a batch is
//! just many sessions in flight at once. Sessions are started from the
//! calling thread and joined in input order, keeping at most
//! [`ParallelConfig::max_in_flight`] of them running.
//!
//! # Example
//!
//! ```rust
//! use ambiparse::engine::builder::{plus, sym, GrammarBuilder};
//! use ambiparse::engine::config::EngineConfig;
//! use ambiparse::engine::grammar::Terminal;
//! use ambiparse::engine::parallel::{parse_batch, ParallelConfig};
//! use ambiparse::engine::parser::ParseEngine;
//! use std::sync::Arc;
//!
//! let mut b = GrammarBuilder::new();
//! let digit = b.terminal("digit", Terminal::range('0', '9'));
//! let number = b.greedy_production("number", plus(sym(digit)));
//! let engine = ParseEngine::new(Arc::new(b.build().unwrap()), EngineConfig::default()).unwrap();
//!
//! let results = parse_batch(&engine, number, &["12", "x", "345"], &ParallelConfig::default());
//! assert_eq!(results.len(), 3);
//! assert!(results[1].as_ref().unwrap().abstract_syntax_graph().is_empty());
//! ```

use super::error::ParseError;
use super::grammar::SymbolId;
use super::parser::{Parse, ParseEngine, ParseOutcome};
use std::collections::VecDeque;

/// Configuration for batch parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Maximum number of parses running at once (0 = unbounded)
    pub max_in_flight: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { max_in_flight: 0 }
    }
}

impl ParallelConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of parses running at once
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n;
        self
    }
}

/// Parse every input as `root`, results in input order
///
/// Must be called from outside the engine's pool.
pub fn parse_batch<S: AsRef<str>>(
    engine: &ParseEngine,
    root: SymbolId,
    inputs: &[S],
    config: &ParallelConfig,
) -> Vec<Result<ParseOutcome, ParseError>> {
    let window = if config.max_in_flight == 0 {
        inputs.len().max(1)
    } else {
        config.max_in_flight
    };

    let mut results = Vec::with_capacity(inputs.len());
    let mut running: VecDeque<Result<Parse, ParseError>> = VecDeque::with_capacity(window);

    for input in inputs {
        if running.len() == window {
            if let Some(oldest) = running.pop_front() {
                results.push(oldest.map(Parse::join));
            }
        }
        running.push_back(engine.parse(input.as_ref(), root, None));
    }
    results.extend(running.into_iter().map(|p| p.map(Parse::join)));
    results
}
