//! Configuration walkers
//!
//! A [`Walker`] is one configuration of a production's NFA during a parse:
//! a position in the document plus the set of NFA states reachable there.
//! It asks the dispatcher of every symbol on an outgoing edge for matches
//! at its position and, for each span delivered, starts a successor
//! walker past that span. The chain of antecedents back to the owner's
//! root walker spells out the children of any match the walker emits.
//!
//! # Termination
//!
//! Each walker counts its outstanding work:
//!
//! - one hold while it registers its dependencies,
//! - one per dependency not yet exhausted,
//! - one per delivered span until that successor terminates.
//!
//! When the count reaches zero the walker terminates and releases its
//! antecedent. The root walker's termination completes its dispatcher.
//!
//! # Greedy productions
//!
//! Every emission flags the whole antecedent chain. A greedy walker in an
//! accepting configuration only emits on termination, and only if no
//! successor emitted before it.

use super::dispatcher::DispatcherId;
use super::grammar::{insert_sorted, Grammar, StateId, SymbolId};
use super::matching::{Match, MatchCategory, MatchClass};
use super::parser::Session;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One NFA configuration of a production at a document position
pub(crate) struct Walker {
    /// Dispatcher whose production this walk belongs to
    owner: DispatcherId,
    /// Category of the owner; its position is where the match starts
    origin: MatchCategory,
    greedy: bool,
    /// Current position in code points
    position: usize,
    /// Sorted, deduplicated NFA states
    states: Vec<StateId>,
    accepting: bool,
    /// Walker this one was spawned from (`None` for the root walker)
    antecedent: Option<Arc<Walker>>,
    /// Span consumed to get here from the antecedent
    entrance: Option<MatchClass>,
    outstanding: AtomicUsize,
    subsequent_made_match: AtomicBool,
}

impl Walker {
    /// The first walker of a production, at its start states
    pub fn root(
        owner: DispatcherId,
        origin: MatchCategory,
        greedy: bool,
        start_states: &[StateId],
        grammar: &Grammar,
    ) -> Arc<Self> {
        let mut states = start_states.to_vec();
        states.sort_unstable();
        states.dedup();
        Arc::new(Self::with_parts(
            owner,
            origin,
            greedy,
            origin.position,
            states,
            None,
            None,
            grammar,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn with_parts(
        owner: DispatcherId,
        origin: MatchCategory,
        greedy: bool,
        position: usize,
        states: Vec<StateId>,
        antecedent: Option<Arc<Walker>>,
        entrance: Option<MatchClass>,
        grammar: &Grammar,
    ) -> Self {
        let accepting = grammar
            .production(origin.symbol)
            .map(|p| states.iter().any(|&s| p.nfa.is_accept(s)))
            .unwrap_or(false);

        Self {
            owner,
            origin,
            greedy,
            position,
            states,
            accepting,
            antecedent,
            entrance,
            // The start-up hold
            outstanding: AtomicUsize::new(1),
            subsequent_made_match: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn owner(&self) -> DispatcherId {
        self.owner
    }

    /// Register dependencies and drop the start-up hold
    pub fn start(self: &Arc<Self>, session: &Arc<Session>) {
        session.walker_started();

        if self.accepting && !self.greedy {
            self.emit(session);
        }

        let symbols = self.outgoing_symbols(session.grammar());
        self.outstanding.fetch_add(symbols.len(), Ordering::AcqRel);

        let mut site = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let category = MatchCategory::new(self.position, symbol);
            site.push(category);
            session
                .request(category)
                .add_dependency(session, Arc::clone(self));
        }
        session.record_site(site);

        self.release(session);
    }

    /// Distinct symbols on edges leaving the current states, ascending
    fn outgoing_symbols(&self, grammar: &Grammar) -> Vec<SymbolId> {
        let mut symbols = Vec::new();
        for &state in &self.states {
            for transition in grammar.transitions(self.origin.symbol, state) {
                insert_sorted(&mut symbols, transition.on);
            }
        }
        symbols
    }

    /// Count a delivery about to be scheduled
    #[inline]
    pub fn retain(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Consume a delivered span
    ///
    /// Spawns the successor configuration inline, or gives the delivery's
    /// count back when no successor is possible.
    pub fn advance(self: &Arc<Self>, session: &Arc<Session>, class: MatchClass) {
        let grammar = session.grammar();

        let mut next = Vec::new();
        for &state in &self.states {
            for transition in grammar.transitions(self.origin.symbol, state) {
                if transition.on == class.symbol() {
                    for &target in &transition.targets {
                        insert_sorted(&mut next, target);
                    }
                }
            }
        }

        if next.is_empty() || self.repeats_empty_step(class, &next) {
            self.release(session);
            return;
        }

        let successor = Arc::new(Self::with_parts(
            self.owner,
            self.origin,
            self.greedy,
            self.position + class.length,
            next,
            Some(Arc::clone(self)),
            Some(class),
            grammar,
        ));
        successor.start(session);
    }

    /// A zero-length step into a configuration already on the chain at
    /// this position can only repeat an existing derivation
    fn repeats_empty_step(&self, class: MatchClass, next: &[StateId]) -> bool {
        if class.length != 0 {
            return false;
        }

        let mut walker = Some(self);
        while let Some(w) = walker {
            if w.position != self.position {
                return false;
            }
            if w.states == next {
                return true;
            }
            walker = w.antecedent.as_deref();
        }
        false
    }

    /// Give back one unit of work, terminating walkers that run out
    ///
    /// # Panics
    /// Panics if the counter would underflow.
    pub fn release(&self, session: &Arc<Session>) {
        let mut walker = self;
        loop {
            let previous = walker.outstanding.fetch_sub(1, Ordering::AcqRel);
            assert!(
                previous > 0,
                "walker counter underflow at {} in {}",
                walker.position,
                walker.origin
            );
            if previous != 1 {
                return;
            }

            walker.terminate(session);

            match walker.antecedent.as_deref() {
                Some(antecedent) => walker = antecedent,
                None => {
                    session.dispatcher(walker.owner).node_completed(session);
                    return;
                }
            }
        }
    }

    fn terminate(&self, session: &Arc<Session>) {
        if self.greedy
            && self.accepting
            && !self.subsequent_made_match.load(Ordering::Acquire)
        {
            self.emit(session);
        }
    }

    /// Report the span from the owner's position to here
    fn emit(&self, session: &Arc<Session>) {
        let mut ancestor = self.antecedent.as_deref();
        while let Some(a) = ancestor {
            if a.subsequent_made_match.swap(true, Ordering::AcqRel) {
                // Everything further back was flagged by an earlier emission
                break;
            }
            ancestor = a.antecedent.as_deref();
        }

        let class = self
            .origin
            .with_length(self.position - self.origin.position);
        let result = Match::new(class, self.children());
        session.dispatcher(self.owner).add_result(session, result);
    }

    /// Entrance spans from the root walker to this one
    pub fn children(&self) -> Vec<MatchClass> {
        let mut children = Vec::new();
        let mut walker = Some(self);
        while let Some(w) = walker {
            if let Some(entrance) = w.entrance {
                children.push(entrance);
            }
            walker = w.antecedent.as_deref();
        }
        children.reverse();
        children
    }
}

impl Drop for Walker {
    // Unlink the antecedent chain iteratively; long chains would
    // otherwise overflow the stack through recursive drops.
    fn drop(&mut self) {
        let mut next = self.antecedent.take();
        while let Some(walker) = next {
            match Arc::try_unwrap(walker) {
                Ok(mut walker) => next = walker.antecedent.take(),
                Err(_) => break,
            }
        }
    }
}
