//! Memoization keys and match records
//!
//! - [`MatchCategory`]: every attempt to match one symbol at one position
//! - [`MatchClass`]: one matched span of a category (a node of the graph)
//! - [`Match`]: one derivation of a span; several matches sharing a class
//!   are an ambiguity
//!
//! All three are plain values with structural equality. Categories and
//! classes are `Copy` and hash in constant time.

use super::grammar::SymbolId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All attempts to match `symbol` starting at `position`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MatchCategory {
    /// Start position in code points
    pub position: usize,
    /// The symbol being matched
    pub symbol: SymbolId,
}

impl MatchCategory {
    /// Create a category
    #[inline]
    pub fn new(position: usize, symbol: SymbolId) -> Self {
        Self { position, symbol }
    }

    /// The class of this category with the given length
    #[inline]
    pub fn with_length(self, length: usize) -> MatchClass {
        MatchClass {
            category: self,
            length,
        }
    }
}

impl fmt::Display for MatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.position)
    }
}

/// A specific matched span of a category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MatchClass {
    /// The category this span belongs to
    pub category: MatchCategory,
    /// Length of the span in code points
    pub length: usize,
}

impl MatchClass {
    /// Create a class from its parts
    #[inline]
    pub fn new(position: usize, symbol: SymbolId, length: usize) -> Self {
        MatchCategory::new(position, symbol).with_length(length)
    }

    /// Start position
    #[inline]
    pub fn position(&self) -> usize {
        self.category.position
    }

    /// Matched symbol
    #[inline]
    pub fn symbol(&self) -> SymbolId {
        self.category.symbol
    }

    /// Position just past the span
    #[inline]
    pub fn end(&self) -> usize {
        self.category.position + self.length
    }
}

impl fmt::Display for MatchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}..{}",
            self.category.symbol,
            self.category.position,
            self.end()
        )
    }
}

/// One derivation of a span
///
/// `children` are the sub-matches consumed by a production's walk, in
/// order; a terminal match has no children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Match {
    /// The derived span
    pub class: MatchClass,
    /// Consumed sub-spans, left to right
    pub children: Vec<MatchClass>,
}

impl Match {
    /// Create a match
    #[inline]
    pub fn new(class: MatchClass, children: Vec<MatchClass>) -> Self {
        Self { class, children }
    }

    /// A childless match, as produced by terminals
    #[inline]
    pub fn leaf(class: MatchClass) -> Self {
        Self::new(class, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    #[test]
    fn test_structural_equality() {
        let a = MatchClass::new(3, SymbolId(1), 2);
        let b = MatchCategory::new(3, SymbolId(1)).with_length(2);
        assert_eq!(a, b);
        assert_ne!(a, MatchClass::new(3, SymbolId(1), 1));
        assert_ne!(a, MatchClass::new(3, SymbolId(2), 2));

        let set: HashSet<MatchClass> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_class_accessors() {
        let class = MatchClass::new(4, SymbolId(7), 3);
        assert_eq!(class.position(), 4);
        assert_eq!(class.symbol(), SymbolId(7));
        assert_eq!(class.end(), 7);
        assert_eq!(class.to_string(), "#7@4..7");
        assert_eq!(class.category.to_string(), "#7@4");
    }

    #[test]
    fn test_ordering_is_position_first() {
        let mut classes = vec![
            MatchClass::new(2, SymbolId(0), 1),
            MatchClass::new(0, SymbolId(5), 1),
            MatchClass::new(0, SymbolId(1), 3),
        ];
        classes.sort();
        assert_eq!(classes[0], MatchClass::new(0, SymbolId(1), 3));
        assert_eq!(classes[2], MatchClass::new(2, SymbolId(0), 1));
    }

    #[test]
    fn test_leaf_match() {
        let m = Match::leaf(MatchClass::new(0, SymbolId(0), 1));
        assert!(m.children.is_empty());
    }
}
