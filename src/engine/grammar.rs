//! Grammar types for the parse engine
//!
//! A grammar is a flat table of [`Symbol`]s addressed by [`SymbolId`].
//! Every symbol is either a fixed-length [`Terminal`] or a [`Production`]
//! that owns an NFA over symbol ids. Grammars are immutable once built and
//! are shared read-only (behind an `Arc`) by every parse that uses them.
//!
//! Grammars are usually put together with
//! [`GrammarBuilder`](super::builder::GrammarBuilder), but they can also be
//! serialized to and from JSON.

use super::error::ParseError;
use super::regex_cache;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a symbol in a [`Grammar`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

impl SymbolId {
    /// Position of the symbol in the grammar's symbol table
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A state of a production's NFA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u32);

impl StateId {
    /// Position of the state in its NFA
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A symbol that matches a fixed-length span by direct inspection
///
/// Every kind except [`Terminal::Literal`] matches exactly one code point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    /// Match a literal sequence of code points
    Literal {
        /// The text to match
        text: String,
    },

    /// Match one code point in an inclusive range
    Range {
        /// Lowest accepted code point
        lo: char,
        /// Highest accepted code point
        hi: char,
    },

    /// Match one code point from a set
    Set {
        /// Accepted code points
        chars: String,
    },

    /// Match any single code point
    Any,

    /// Match one code point whose text fully matches a regular expression
    Pattern {
        /// The regex, e.g. `[[:alpha:]_]`
        pattern: String,
    },
}

impl Terminal {
    /// Create a literal terminal
    pub fn literal(text: impl Into<String>) -> Self {
        Terminal::Literal { text: text.into() }
    }

    /// Create a range terminal
    pub fn range(lo: char, hi: char) -> Self {
        Terminal::Range { lo, hi }
    }

    /// Create a set terminal
    pub fn set(chars: impl Into<String>) -> Self {
        Terminal::Set {
            chars: chars.into(),
        }
    }

    /// Create a single-code-point regex terminal
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Terminal::Pattern {
            pattern: pattern.into(),
        }
    }

    /// Number of code points this terminal consumes when it matches
    pub fn length(&self) -> usize {
        match self {
            Terminal::Literal { text } => text.chars().count(),
            _ => 1,
        }
    }

    /// Match against `codepoints` at `position`
    ///
    /// Returns the match length, or `None` if the terminal does not match.
    /// A terminal never matches past the end of `codepoints`.
    pub fn matches(&self, codepoints: &[char], position: usize) -> Option<usize> {
        let rest = codepoints.get(position..)?;
        let matched = match self {
            Terminal::Literal { text } => {
                let mut len = 0;
                for expected in text.chars() {
                    if rest.get(len) != Some(&expected) {
                        return None;
                    }
                    len += 1;
                }
                return Some(len);
            }
            Terminal::Range { lo, hi } => rest.first().is_some_and(|c| (*lo..=*hi).contains(c)),
            Terminal::Set { chars } => rest.first().is_some_and(|c| chars.contains(*c)),
            Terminal::Any => !rest.is_empty(),
            Terminal::Pattern { pattern } => match rest.first() {
                Some(c) => regex_cache::matches_char(pattern, *c),
                None => false,
            },
        };
        matched.then_some(1)
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Literal { text } => write!(f, "{:?}", text),
            Terminal::Range { lo, hi } => write!(f, "[{}-{}]", lo, hi),
            Terminal::Set { chars } => write!(f, "[{}]", chars),
            Terminal::Any => write!(f, "any"),
            Terminal::Pattern { pattern } => write!(f, "/{}/", pattern),
        }
    }
}

/// Outgoing edges of one NFA state on one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The symbol that must match to take this edge
    pub on: SymbolId,
    /// Target states, sorted and deduplicated
    pub targets: Vec<StateId>,
}

/// A nondeterministic finite automaton over grammar symbols
///
/// States are numbered `0..state_count`. `transitions[s]` lists the edges
/// leaving state `s`, with at most one [`Transition`] per symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nfa {
    state_count: u32,
    start: Vec<StateId>,
    accept: Vec<StateId>,
    transitions: Vec<Vec<Transition>>,
}

impl Nfa {
    /// Create an NFA with `state_count` states and no transitions
    pub fn new(state_count: u32) -> Self {
        Self {
            state_count,
            start: Vec::new(),
            accept: Vec::new(),
            transitions: vec![Vec::new(); state_count as usize],
        }
    }

    /// Mark a state as a start state
    pub fn add_start(&mut self, state: StateId) -> &mut Self {
        self.check_state(state);
        insert_sorted(&mut self.start, state);
        self
    }

    /// Mark a state as an accept state
    pub fn add_accept(&mut self, state: StateId) -> &mut Self {
        self.check_state(state);
        insert_sorted(&mut self.accept, state);
        self
    }

    /// Add an edge `from --on--> to`
    pub fn add_transition(&mut self, from: StateId, on: SymbolId, to: StateId) -> &mut Self {
        self.check_state(from);
        self.check_state(to);
        let edges = &mut self.transitions[from.index()];
        match edges.iter_mut().find(|t| t.on == on) {
            Some(t) => insert_sorted(&mut t.targets, to),
            None => edges.push(Transition {
                on,
                targets: vec![to],
            }),
        }
        self
    }

    /// Number of states
    #[inline]
    pub fn state_count(&self) -> usize {
        self.state_count as usize
    }

    /// Start states, sorted
    #[inline]
    pub fn start_states(&self) -> &[StateId] {
        &self.start
    }

    /// Accept states, sorted
    #[inline]
    pub fn accept_states(&self) -> &[StateId] {
        &self.accept
    }

    /// Edges leaving `state`
    #[inline]
    pub fn transitions(&self, state: StateId) -> &[Transition] {
        self.transitions
            .get(state.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `state` is an accept state
    #[inline]
    pub fn is_accept(&self, state: StateId) -> bool {
        self.accept.binary_search(&state).is_ok()
    }

    /// Every symbol referenced by some transition
    pub fn referenced_symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.transitions.iter().flatten().map(|t| t.on)
    }

    /// Restore the sorted, deduplicated layout and check state bounds
    ///
    /// Edges on the same symbol out of one state are merged. Used on NFAs
    /// that did not come through the mutators above, such as deserialized
    /// ones.
    pub fn normalize(&mut self) -> Result<(), String> {
        let count = self.state_count;
        if self.transitions.len() != count as usize {
            return Err(format!(
                "{} transition lists for {} states",
                self.transitions.len(),
                count
            ));
        }
        let in_range = |state: &StateId| {
            if state.0 < count {
                Ok(())
            } else {
                Err(format!("state {} out of range for {} states", state.0, count))
            }
        };

        for states in [&mut self.start, &mut self.accept] {
            states.iter().try_for_each(in_range)?;
            states.sort_unstable();
            states.dedup();
        }

        for edges in &mut self.transitions {
            let mut merged: Vec<Transition> = Vec::with_capacity(edges.len());
            for mut edge in edges.drain(..) {
                edge.targets.iter().try_for_each(in_range)?;
                match merged.iter_mut().find(|t| t.on == edge.on) {
                    Some(t) => t.targets.append(&mut edge.targets),
                    None => merged.push(edge),
                }
            }
            for edge in &mut merged {
                edge.targets.sort_unstable();
                edge.targets.dedup();
            }
            *edges = merged;
        }
        Ok(())
    }

    fn check_state(&self, state: StateId) {
        assert!(
            state.0 < self.state_count,
            "state {} out of range for an NFA with {} states",
            state.0,
            self.state_count
        );
    }
}

pub(crate) fn insert_sorted<T: Ord>(items: &mut Vec<T>, item: T) {
    if let Err(at) = items.binary_search(&item) {
        items.insert(at, item);
    }
}

/// A named rule whose body is an NFA over symbols
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    /// The production's automaton
    pub nfa: Nfa,
    /// Report only maximal-length matches
    pub greedy: bool,
}

/// What a symbol is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    /// Matched directly against the document
    Terminal(Terminal),
    /// Matched by walking an NFA over other symbols
    Production(Production),
}

/// A named grammar symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Display name (used in diagnostics)
    pub name: String,
    /// Terminal or production body
    pub kind: SymbolKind,
}

impl Symbol {
    /// The production body, if this symbol is a production
    #[inline]
    pub fn as_production(&self) -> Option<&Production> {
        match &self.kind {
            SymbolKind::Production(p) => Some(p),
            SymbolKind::Terminal(_) => None,
        }
    }

    /// The terminal, if this symbol is a terminal
    #[inline]
    pub fn as_terminal(&self) -> Option<&Terminal> {
        match &self.kind {
            SymbolKind::Terminal(t) => Some(t),
            SymbolKind::Production(_) => None,
        }
    }

    /// Whether this is a greedy production
    #[inline]
    pub fn is_greedy(&self) -> bool {
        self.as_production().is_some_and(|p| p.greedy)
    }
}

/// A complete grammar
///
/// The engine assumes a well-formed grammar: every transition refers to an
/// existing symbol. [`Grammar::validate`] checks this, and both
/// [`GrammarBuilder::build`](super::builder::GrammarBuilder::build) and
/// [`Grammar::from_json`] run it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    symbols: Vec<Symbol>,
}

impl Grammar {
    pub(crate) fn from_symbols(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    /// Get a symbol by id
    #[inline]
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Find a symbol by name
    pub fn symbol_by_name(&self, name: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|s| s.name == name)
            .map(|i| SymbolId(i as u32))
    }

    /// Display name of a symbol, or `"?"` for an unknown id
    pub fn name(&self, id: SymbolId) -> &str {
        self.symbol(id).map(|s| s.name.as_str()).unwrap_or("?")
    }

    /// Total symbol count
    #[inline]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Iterate over `(id, symbol)` pairs
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId(i as u32), s))
    }

    /// Start states of a production (empty for terminals)
    pub fn start_states(&self, production: SymbolId) -> &[StateId] {
        self.production(production)
            .map(|p| p.nfa.start_states())
            .unwrap_or(&[])
    }

    /// Accept states of a production (empty for terminals)
    pub fn accept_states(&self, production: SymbolId) -> &[StateId] {
        self.production(production)
            .map(|p| p.nfa.accept_states())
            .unwrap_or(&[])
    }

    /// Edges leaving `state` in a production's NFA
    pub fn transitions(&self, production: SymbolId, state: StateId) -> &[Transition] {
        self.production(production)
            .map(|p| p.nfa.transitions(state))
            .unwrap_or(&[])
    }

    /// Match a terminal symbol against the document
    ///
    /// Returns `None` for productions and for terminals that do not match.
    pub fn terminal_match(
        &self,
        terminal: SymbolId,
        codepoints: &[char],
        position: usize,
    ) -> Option<usize> {
        self.symbol(terminal)?
            .as_terminal()?
            .matches(codepoints, position)
    }

    /// Production body of a symbol
    #[inline]
    pub fn production(&self, id: SymbolId) -> Option<&Production> {
        self.symbol(id)?.as_production()
    }

    /// Serialize to JSON
    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    ///
    /// The result is normalized and validated the same way
    /// [`GrammarBuilder::build`](super::builder::GrammarBuilder::build)
    /// validates its output, so malformed grammars are rejected here rather
    /// than during a parse.
    pub fn from_json(s: &str) -> Result<Self, ParseError> {
        let mut grammar: Grammar =
            serde_json::from_str(s).map_err(|e| ParseError::InvalidGrammar {
                reason: format!("malformed grammar JSON: {}", e),
            })?;
        for Symbol { name, kind } in &mut grammar.symbols {
            if let SymbolKind::Production(production) = kind {
                production
                    .nfa
                    .normalize()
                    .map_err(|reason| ParseError::InvalidGrammar {
                        reason: format!("production {:?}: {}", name, reason),
                    })?;
            }
        }
        grammar.validate()?;
        Ok(grammar)
    }

    /// Check that every pattern compiles and every transition names a
    /// symbol of this grammar
    pub fn validate(&self) -> Result<(), ParseError> {
        let count = self.symbols.len();
        for symbol in &self.symbols {
            match &symbol.kind {
                SymbolKind::Terminal(Terminal::Pattern { pattern }) => {
                    regex_cache::validate(pattern).map_err(|e| ParseError::InvalidGrammar {
                        reason: format!("terminal {:?}: {}", symbol.name, e),
                    })?;
                }
                SymbolKind::Production(production) => {
                    if let Some(bad) = production
                        .nfa
                        .referenced_symbols()
                        .find(|s| s.index() >= count)
                    {
                        return Err(ParseError::InvalidGrammar {
                            reason: format!(
                                "production {:?} refers to unknown symbol {}",
                                symbol.name, bad
                            ),
                        });
                    }
                }
                SymbolKind::Terminal(_) => {}
            }
        }
        Ok(())
    }

    /// Resolve a symbol name, reporting an error for unknown names
    pub fn require(&self, name: &str) -> Result<SymbolId, ParseError> {
        self.symbol_by_name(name)
            .ok_or_else(|| ParseError::InvalidGrammar {
                reason: format!("no symbol named {:?}", name),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_literal_match() {
        let t = Terminal::literal("ab");
        let doc = chars("xaby");
        assert_eq!(t.matches(&doc, 1), Some(2));
        assert_eq!(t.matches(&doc, 0), None);
        assert_eq!(t.matches(&doc, 3), None);
        assert_eq!(t.length(), 2);
    }

    #[test]
    fn test_literal_counts_code_points() {
        let t = Terminal::literal("你好");
        let doc = chars("你好!");
        assert_eq!(t.length(), 2);
        assert_eq!(t.matches(&doc, 0), Some(2));
    }

    #[test]
    fn test_single_code_point_terminals() {
        let doc = chars("a7_");
        assert_eq!(Terminal::range('0', '9').matches(&doc, 1), Some(1));
        assert_eq!(Terminal::range('0', '9').matches(&doc, 0), None);
        assert_eq!(Terminal::set("_-").matches(&doc, 2), Some(1));
        assert_eq!(Terminal::Any.matches(&doc, 0), Some(1));
        assert_eq!(Terminal::Any.matches(&doc, 3), None);
        assert_eq!(Terminal::pattern("[a-z]").matches(&doc, 0), Some(1));
        assert_eq!(Terminal::pattern("[a-z]").matches(&doc, 1), None);
    }

    #[test]
    fn test_position_past_end() {
        let doc = chars("a");
        assert_eq!(Terminal::literal("a").matches(&doc, 5), None);
        assert_eq!(Terminal::Any.matches(&doc, 5), None);
    }

    #[test]
    fn test_nfa_transitions_merge_targets() {
        let mut nfa = Nfa::new(3);
        nfa.add_start(StateId(0))
            .add_accept(StateId(2))
            .add_transition(StateId(0), SymbolId(4), StateId(2))
            .add_transition(StateId(0), SymbolId(4), StateId(1))
            .add_transition(StateId(0), SymbolId(4), StateId(1));

        let edges = nfa.transitions(StateId(0));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].targets, vec![StateId(1), StateId(2)]);
        assert!(nfa.is_accept(StateId(2)));
        assert!(!nfa.is_accept(StateId(0)));
        assert!(nfa.transitions(StateId(9)).is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_nfa_rejects_unknown_state() {
        let mut nfa = Nfa::new(1);
        nfa.add_accept(StateId(1));
    }

    #[test]
    fn test_grammar_lookup() {
        let mut nfa = Nfa::new(2);
        nfa.add_start(StateId(0))
            .add_accept(StateId(1))
            .add_transition(StateId(0), SymbolId(0), StateId(1));
        let grammar = Grammar::from_symbols(vec![
            Symbol {
                name: "x".into(),
                kind: SymbolKind::Terminal(Terminal::literal("x")),
            },
            Symbol {
                name: "X".into(),
                kind: SymbolKind::Production(Production { nfa, greedy: true }),
            },
        ]);

        assert_eq!(grammar.symbol_by_name("X"), Some(SymbolId(1)));
        assert_eq!(grammar.name(SymbolId(0)), "x");
        assert_eq!(grammar.name(SymbolId(7)), "?");
        assert_eq!(grammar.start_states(SymbolId(1)), &[StateId(0)]);
        assert_eq!(grammar.accept_states(SymbolId(1)), &[StateId(1)]);
        assert!(grammar.start_states(SymbolId(0)).is_empty());
        assert!(grammar.symbol(SymbolId(1)).unwrap().is_greedy());
        assert_eq!(grammar.terminal_match(SymbolId(0), &chars("x"), 0), Some(1));
        assert_eq!(grammar.terminal_match(SymbolId(1), &chars("x"), 0), None);
        assert!(grammar.require("nope").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut nfa = Nfa::new(2);
        nfa.add_start(StateId(0))
            .add_accept(StateId(1))
            .add_transition(StateId(0), SymbolId(0), StateId(1));
        let grammar = Grammar::from_symbols(vec![
            Symbol {
                name: "digit".into(),
                kind: SymbolKind::Terminal(Terminal::range('0', '9')),
            },
            Symbol {
                name: "num".into(),
                kind: SymbolKind::Production(Production { nfa, greedy: false }),
            },
        ]);

        let json = grammar.to_json().unwrap();
        let back = Grammar::from_json(&json).unwrap();
        assert_eq!(grammar, back);
    }

    #[test]
    fn test_normalize_merges_edges() {
        let json = r#"{"state_count":3,"start":[0,0],"accept":[2,1],
            "transitions":[[{"on":4,"targets":[2]},{"on":4,"targets":[1,2]}],[],[]]}"#;
        let mut nfa: Nfa = serde_json::from_str(json).unwrap();
        nfa.normalize().unwrap();

        assert_eq!(nfa.start_states(), &[StateId(0)]);
        assert_eq!(nfa.accept_states(), &[StateId(1), StateId(2)]);
        assert_eq!(
            nfa.transitions(StateId(0)),
            &[Transition {
                on: SymbolId(4),
                targets: vec![StateId(1), StateId(2)],
            }]
        );
        assert!(nfa.is_accept(StateId(1)));
    }

    #[test]
    fn test_normalize_rejects_bad_shapes() {
        let short: Nfa =
            serde_json::from_str(r#"{"state_count":2,"start":[0],"accept":[],"transitions":[[]]}"#)
                .unwrap();
        assert!(short.clone().normalize().is_err());

        let mut stray: Nfa = serde_json::from_str(
            r#"{"state_count":1,"start":[0],"accept":[],"transitions":[[{"on":0,"targets":[3]}]]}"#,
        )
        .unwrap();
        assert!(stray.normalize().unwrap_err().contains("state 3"));
    }
}
