//! Grammar construction DSL
//!
//! A small, composable API for putting a [`Grammar`] together in Rust.
//! Production bodies are written as [`Pattern`]s over symbol ids and are
//! compiled into ε-free NFAs with the Glushkov position construction:
//! state 0 is the initial state and every symbol occurrence in the pattern
//! gets its own state.
//!
//! # Example
//!
//! ```rust
//! use ambiparse::engine::builder::*;
//! use ambiparse::engine::grammar::Terminal;
//!
//! let mut g = GrammarBuilder::new();
//! let digit = g.terminal("digit", Terminal::range('0', '9'));
//! let plus = g.literal("+");
//! let sum = g.production("sum", seq([sym(digit), sym(plus), sym(digit)]));
//! let grammar = g.build().unwrap();
//! assert_eq!(grammar.name(sum), "sum");
//! ```

use super::error::ParseError;
use super::grammar::{
    insert_sorted, Grammar, Nfa, Production, StateId, Symbol, SymbolId, SymbolKind, Terminal,
};
use hashbrown::HashMap;

/// A regular expression over grammar symbols
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matches the empty sequence
    Empty,
    /// Matches one symbol
    Symbol(SymbolId),
    /// Matches each part in order
    Seq(Vec<Pattern>),
    /// Matches any one alternative
    Choice(Vec<Pattern>),
    /// Matches zero or more repetitions
    Star(Box<Pattern>),
    /// Matches one or more repetitions
    Plus(Box<Pattern>),
    /// Matches zero or one occurrence
    Opt(Box<Pattern>),
}

/// Match one symbol
pub fn sym(id: SymbolId) -> Pattern {
    Pattern::Symbol(id)
}

/// Match a sequence of patterns
pub fn seq(parts: impl IntoIterator<Item = Pattern>) -> Pattern {
    Pattern::Seq(parts.into_iter().collect())
}

/// Match one of several patterns
pub fn choice(alternatives: impl IntoIterator<Item = Pattern>) -> Pattern {
    Pattern::Choice(alternatives.into_iter().collect())
}

/// Match zero or more repetitions
pub fn star(inner: Pattern) -> Pattern {
    Pattern::Star(Box::new(inner))
}

/// Match one or more repetitions
pub fn plus(inner: Pattern) -> Pattern {
    Pattern::Plus(Box::new(inner))
}

/// Match an optional pattern
pub fn opt(inner: Pattern) -> Pattern {
    Pattern::Opt(Box::new(inner))
}

/// Match nothing (always succeeds with length zero)
pub fn empty() -> Pattern {
    Pattern::Empty
}

/// Glushkov summary of a sub-pattern
struct Summary {
    nullable: bool,
    first: Vec<u32>,
    last: Vec<u32>,
}

/// Position-automaton construction state
#[derive(Default)]
struct Glushkov {
    /// Symbol of each position (position `p` is NFA state `p`; index 0 unused)
    symbols: Vec<SymbolId>,
    /// Follow sets indexed by position
    follow: Vec<Vec<u32>>,
}

impl Glushkov {
    fn new() -> Self {
        Self {
            symbols: vec![SymbolId(u32::MAX)],
            follow: vec![Vec::new()],
        }
    }

    fn visit(&mut self, pattern: &Pattern) -> Summary {
        match pattern {
            Pattern::Empty => Summary {
                nullable: true,
                first: Vec::new(),
                last: Vec::new(),
            },
            Pattern::Symbol(id) => {
                let p = self.symbols.len() as u32;
                self.symbols.push(*id);
                self.follow.push(Vec::new());
                Summary {
                    nullable: false,
                    first: vec![p],
                    last: vec![p],
                }
            }
            Pattern::Seq(parts) => {
                let mut acc = self.visit(&Pattern::Empty);
                for part in parts {
                    let next = self.visit(part);
                    for &x in &acc.last {
                        self.extend_follow(x, &next.first);
                    }
                    let mut first = acc.first;
                    if acc.nullable {
                        union_into(&mut first, &next.first);
                    }
                    let mut last = next.last;
                    if next.nullable {
                        union_into(&mut last, &acc.last);
                    }
                    acc = Summary {
                        nullable: acc.nullable && next.nullable,
                        first,
                        last,
                    };
                }
                acc
            }
            Pattern::Choice(alternatives) => {
                // An empty choice never matches
                let mut acc = Summary {
                    nullable: false,
                    first: Vec::new(),
                    last: Vec::new(),
                };
                for alternative in alternatives {
                    let next = self.visit(alternative);
                    acc.nullable |= next.nullable;
                    union_into(&mut acc.first, &next.first);
                    union_into(&mut acc.last, &next.last);
                }
                acc
            }
            Pattern::Star(inner) | Pattern::Plus(inner) => {
                let summary = self.visit(inner);
                for &x in &summary.last {
                    self.extend_follow(x, &summary.first);
                }
                Summary {
                    nullable: summary.nullable || matches!(pattern, Pattern::Star(_)),
                    ..summary
                }
            }
            Pattern::Opt(inner) => {
                let summary = self.visit(inner);
                Summary {
                    nullable: true,
                    ..summary
                }
            }
        }
    }

    fn extend_follow(&mut self, position: u32, positions: &[u32]) {
        union_into(&mut self.follow[position as usize], positions);
    }

    fn into_nfa(self, summary: Summary) -> Nfa {
        let mut nfa = Nfa::new(self.symbols.len() as u32);
        nfa.add_start(StateId(0));
        if summary.nullable {
            nfa.add_accept(StateId(0));
        }
        for &p in &summary.last {
            nfa.add_accept(StateId(p));
        }
        for &p in &summary.first {
            nfa.add_transition(StateId(0), self.symbols[p as usize], StateId(p));
        }
        for (from, targets) in self.follow.iter().enumerate() {
            for &p in targets {
                nfa.add_transition(StateId(from as u32), self.symbols[p as usize], StateId(p));
            }
        }
        nfa
    }
}

fn union_into(into: &mut Vec<u32>, from: &[u32]) {
    for &x in from {
        insert_sorted(into, x);
    }
}

/// Compile a pattern into an ε-free NFA
pub fn compile(pattern: &Pattern) -> Nfa {
    let mut glushkov = Glushkov::new();
    let summary = glushkov.visit(pattern);
    glushkov.into_nfa(summary)
}

/// Grammar builder for constructing grammars
///
/// Productions can refer to each other (and to themselves) through ids
/// obtained from [`declare`](Self::declare) before their bodies are given.
pub struct GrammarBuilder {
    /// Symbols added so far; declared productions hold `None`
    symbols: Vec<(String, Option<SymbolKind>)>,

    /// Literal terminals by text, so repeated literals share one symbol
    literals: HashMap<String, SymbolId>,
}

impl GrammarBuilder {
    /// Create a new grammar builder
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            literals: HashMap::new(),
        }
    }

    fn push(&mut self, name: &str, kind: Option<SymbolKind>) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push((name.to_string(), kind));
        id
    }

    /// Add a named terminal
    pub fn terminal(&mut self, name: &str, terminal: Terminal) -> SymbolId {
        self.push(name, Some(SymbolKind::Terminal(terminal)))
    }

    /// Add (or reuse) a literal terminal named after its text
    pub fn literal(&mut self, text: &str) -> SymbolId {
        if let Some(&id) = self.literals.get(text) {
            return id;
        }
        let id = self.terminal(&format!("{:?}", text), Terminal::literal(text));
        self.literals.insert(text.to_string(), id);
        id
    }

    /// Reserve an id for a production defined later
    pub fn declare(&mut self, name: &str) -> SymbolId {
        self.push(name, None)
    }

    /// Give a declared production its (non-greedy) body
    pub fn define(&mut self, id: SymbolId, pattern: Pattern) -> &mut Self {
        self.define_nfa(id, compile(&pattern), false)
    }

    /// Give a declared production a greedy body
    ///
    /// A greedy production publishes its longest matches only once it
    /// completes. Inside a recursive cycle it completes when the cycle is
    /// broken, so matches that would need its own result (such as the
    /// longer matches of `A := A 'x' | 'x'`) are not reported: on `"xxx"`
    /// that `A` matches one code point.
    pub fn define_greedy(&mut self, id: SymbolId, pattern: Pattern) -> &mut Self {
        self.define_nfa(id, compile(&pattern), true)
    }

    /// Give a declared production a hand-built NFA
    ///
    /// # Panics
    /// Panics if `id` was not returned by this builder.
    pub fn define_nfa(&mut self, id: SymbolId, nfa: Nfa, greedy: bool) -> &mut Self {
        let slot = &mut self.symbols[id.index()];
        slot.1 = Some(SymbolKind::Production(Production { nfa, greedy }));
        self
    }

    /// Declare and define a non-greedy production in one step
    pub fn production(&mut self, name: &str, pattern: Pattern) -> SymbolId {
        let id = self.declare(name);
        self.define(id, pattern);
        id
    }

    /// Declare and define a greedy production in one step
    pub fn greedy_production(&mut self, name: &str, pattern: Pattern) -> SymbolId {
        let id = self.declare(name);
        self.define_greedy(id, pattern);
        id
    }

    /// Build the grammar
    ///
    /// # Errors
    /// Returns [`ParseError::InvalidGrammar`] when a declared production was
    /// never defined, a transition refers to an unknown symbol, or a
    /// pattern terminal's regex does not compile.
    pub fn build(self) -> Result<Grammar, ParseError> {
        let count = self.symbols.len();
        let mut symbols = Vec::with_capacity(count);

        for (name, kind) in self.symbols {
            let kind = kind.ok_or_else(|| ParseError::InvalidGrammar {
                reason: format!("production {:?} was declared but never defined", name),
            })?;
            symbols.push(Symbol { name, kind });
        }

        let grammar = Grammar::from_symbols(symbols);
        grammar.validate()?;
        Ok(grammar)
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}
