//! Per-category coordinators
//!
//! A [`Dispatcher`] owns every attempt to match one symbol at one position.
//! Walkers that need the symbol register as dependents; the dispatcher
//! forwards each distinct matched span to them exactly once, in the order
//! it was published, and finally tells them the category is exhausted.
//!
//! State only moves forward: results and published spans are appended,
//! and the completed flag is set once.

use super::grammar::SymbolKind;
use super::matching::{Match, MatchCategory, MatchClass};
use super::parser::Session;
use super::table::EntryId;
use super::walker::Walker;
use parking_lot::Mutex;
use std::sync::Arc;

/// Index of a dispatcher in its session's category table
pub(crate) type DispatcherId = EntryId;

struct DispatcherState {
    /// Every result reported to this category, including unpublished ones
    matches: Vec<Match>,
    /// Spans delivered to dependents, in discovery order
    published: Vec<MatchClass>,
    /// Walkers waiting on this category
    dependents: Vec<Arc<Walker>>,
    completed: bool,
    forced: bool,
}

/// Everything a finished dispatcher contributes to the parse outcome
pub(crate) struct DispatcherResults {
    pub published: Vec<MatchClass>,
    pub matches: Vec<Match>,
}

/// Coordinator for one match category
pub(crate) struct Dispatcher {
    id: DispatcherId,
    category: MatchCategory,
    greedy: bool,
    state: Mutex<DispatcherState>,
}

impl Dispatcher {
    pub fn new(id: DispatcherId, category: MatchCategory, greedy: bool) -> Self {
        Self {
            id,
            category,
            greedy,
            state: Mutex::new(DispatcherState {
                matches: Vec::new(),
                published: Vec::new(),
                dependents: Vec::new(),
                completed: false,
                forced: false,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> DispatcherId {
        self.id
    }

    #[inline]
    pub fn category(&self) -> MatchCategory {
        self.category
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Begin matching right after the dispatcher was created
    ///
    /// Terminals are decided on the spot. Productions get a root walker at
    /// the production's start states, started on the pool.
    pub fn start(&self, session: &Arc<Session>) {
        let grammar = session.grammar();
        let Some(symbol) = grammar.symbol(self.category.symbol) else {
            panic!("category {} names an unknown symbol", self.category);
        };

        match &symbol.kind {
            SymbolKind::Terminal(terminal) => {
                if let Some(length) =
                    terminal.matches(session.codepoints(), self.category.position)
                {
                    self.add_result(session, Match::leaf(self.category.with_length(length)));
                }
                self.node_completed(session);
            }
            SymbolKind::Production(production) => {
                let walker = Walker::root(
                    self.id,
                    self.category,
                    production.greedy,
                    grammar.start_states(self.category.symbol),
                    grammar,
                );
                session.spawn(move |session| walker.start(session));
            }
        }
    }

    /// Report a derivation of this category
    ///
    /// A non-greedy dispatcher publishes each new length immediately; a
    /// greedy one holds everything back until completion.
    pub fn add_result(&self, session: &Arc<Session>, result: Match) {
        let mut state = self.state.lock();

        if state.completed {
            assert!(
                state.forced,
                "result {} reported to completed category {}",
                result.class, self.category
            );
            log_debug!(
                "late result {} on force-completed category {}",
                result.class,
                self.category
            );
            state.matches.push(result);
            return;
        }

        let class = result.class;
        state.matches.push(result);

        if self.greedy || state.published.contains(&class) {
            return;
        }

        state.published.push(class);
        for walker in &state.dependents {
            deliver(session, walker, class);
        }
    }

    /// Register a walker that waits on this category
    ///
    /// Already-published spans are replayed to it; if the category is
    /// already exhausted the walker is told so right away.
    pub fn add_dependency(&self, session: &Arc<Session>, walker: Arc<Walker>) {
        let mut state = self.state.lock();

        for &class in &state.published {
            deliver(session, &walker, class);
        }

        if state.completed {
            notify(session, walker);
        } else {
            state.dependents.push(walker);
        }
    }

    /// Mark the category exhausted
    ///
    /// A no-op for a category the deadlock breaker already forced, whose
    /// root walker may still wind down afterwards.
    ///
    /// # Panics
    /// Panics if the category was already completed naturally.
    pub fn node_completed(&self, session: &Arc<Session>) {
        self.complete(session, false);
    }

    /// Completion imposed by the deadlock breaker
    pub fn force_complete(&self, session: &Arc<Session>) {
        log_debug!("forcing completion of {}", self.category);
        self.complete(session, true);
    }

    fn complete(&self, session: &Arc<Session>, forced: bool) {
        let mut state = self.state.lock();

        if !forced && state.forced {
            return;
        }
        assert!(
            !state.completed,
            "category {} completed twice",
            self.category
        );
        state.completed = true;
        state.forced = forced;

        if self.greedy {
            if let Some(longest) = state.matches.iter().map(|m| m.class.length).max() {
                let class = self.category.with_length(longest);
                state.published.push(class);
                for walker in &state.dependents {
                    deliver(session, walker, class);
                }
            }
        }

        for walker in state.dependents.drain(..) {
            notify(session, walker);
        }
        drop(state);

        session.dispatcher_completed();
    }

    /// Owners of the walkers still waiting here (empty once completed)
    pub fn waiting_owners(&self) -> Vec<DispatcherId> {
        let state = self.state.lock();
        if state.completed {
            return Vec::new();
        }
        state.dependents.iter().map(|w| w.owner()).collect()
    }

    /// Move this dispatcher's results out for aggregation
    pub fn take_results(&self) -> DispatcherResults {
        let mut state = self.state.lock();
        state.dependents.clear();
        DispatcherResults {
            published: std::mem::take(&mut state.published),
            matches: std::mem::take(&mut state.matches),
        }
    }
}

/// Hand a published span to a walker on the pool
///
/// The walker's counter is raised before the task exists, so the walker
/// cannot terminate while the delivery is in flight.
fn deliver(session: &Arc<Session>, walker: &Arc<Walker>, class: MatchClass) {
    walker.retain();
    let walker = Arc::clone(walker);
    session.spawn(move |session| walker.advance(session, class));
}

/// Tell a walker on the pool that one of its dependencies is exhausted
fn notify(session: &Arc<Session>, walker: Arc<Walker>) {
    session.spawn(move |session| walker.release(session));
}
