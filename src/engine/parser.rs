//! Parse orchestration
//!
//! A [`ParseEngine`] owns a grammar and a worker pool. Every call to
//! [`parse`](ParseEngine::parse) creates a session with its own category
//! table and starts the root category on the pool right away; the returned
//! [`Parse`] handle is joined to get the [`ParseOutcome`].
//!
//! A session is finished when the pool has no task of it left and no
//! dispatcher is still active. Whenever the pool goes quiet with
//! dispatchers still active, the deadlock breaker runs instead and the
//! session keeps going.
//!
//! # Example
//!
//! ```rust
//! use ambiparse::engine::builder::{seq, sym, GrammarBuilder};
//! use ambiparse::engine::grammar::Terminal;
//! use ambiparse::engine::parser::ParseEngine;
//! use ambiparse::engine::config::EngineConfig;
//! use std::sync::Arc;
//!
//! let mut b = GrammarBuilder::new();
//! let digit = b.terminal("digit", Terminal::range('0', '9'));
//! let plus = b.literal("+");
//! let sum = b.production("sum", seq([sym(digit), sym(plus), sym(digit)]));
//! let grammar = Arc::new(b.build().unwrap());
//!
//! let engine = ParseEngine::new(grammar, EngineConfig::default()).unwrap();
//! let outcome = engine.parse("3+4", sum, None).unwrap().join();
//! let asg = outcome.abstract_syntax_graph();
//!
//! assert!(!asg.is_empty());
//! assert_eq!(asg.get(&asg.root()).unwrap()[0].children.len(), 3);
//! ```

use super::asg::{rank_possible_errors, AbstractSyntaxGraph, PossibleError};
use super::breaker;
use super::config::EngineConfig;
use super::dispatcher::{Dispatcher, DispatcherId};
use super::document::Document;
use super::error::{ErrorBuilder, ParseError, RichError, Span};
use super::grammar::{Grammar, SymbolId};
use super::matching::{Match, MatchCategory, MatchClass};
use super::scheduler::{build_pool, Scheduler};
use super::table::{CategoryTable, FastMap, FastSet};
use parking_lot::{Condvar, Mutex};
use rayon::ThreadPool;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters describing one finished parse
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParseStats {
    /// Categories queried (one dispatcher each)
    pub categories: usize,
    /// Category lookups answered from the table
    pub table_hits: u64,
    /// Fraction of lookups answered from the table
    pub table_hit_rate: f64,
    /// Pool tasks executed
    pub tasks_run: u64,
    /// Walkers started
    pub walkers: u64,
    /// Times the deadlock breaker ran
    pub breaker_rounds: u64,
    /// Dispatchers completed by the deadlock breaker
    pub forced_categories: u64,
}

/// State shared by every task of one parse
pub(crate) struct Session {
    grammar: Arc<Grammar>,
    document: Document,
    /// End of the parse range; terminals never look past it
    end: usize,
    root: MatchClass,
    table: CategoryTable<Dispatcher>,
    scheduler: Scheduler,
    /// Dispatchers created but not yet completed
    active: AtomicUsize,
    /// Categories requested together by one walker
    sites: Mutex<Vec<Vec<MatchCategory>>>,
    walkers: AtomicU64,
    breaker_rounds: AtomicU64,
    forced: AtomicU64,
    outcome: Mutex<Option<ParseOutcome>>,
    finished: Condvar,
}

impl Session {
    fn new(
        grammar: Arc<Grammar>,
        document: Document,
        root: MatchClass,
        pool: Arc<ThreadPool>,
    ) -> Self {
        let end = root.end();
        Self {
            grammar,
            document,
            end,
            root,
            table: CategoryTable::with_capacity(end - root.position() + 16),
            scheduler: Scheduler::new(pool),
            active: AtomicUsize::new(0),
            sites: Mutex::new(Vec::new()),
            walkers: AtomicU64::new(0),
            breaker_rounds: AtomicU64::new(0),
            forced: AtomicU64::new(0),
            outcome: Mutex::new(None),
            finished: Condvar::new(),
        }
    }

    #[inline]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// The document up to the end of the parse range
    #[inline]
    pub fn codepoints(&self) -> &[char] {
        &self.document.codepoints()[..self.end]
    }

    /// Run a task on the pool as part of this parse
    pub fn spawn<F>(self: &Arc<Self>, task: F)
    where
        F: FnOnce(&Arc<Session>) + Send + 'static,
    {
        let session = Arc::clone(self);
        self.scheduler.submit(move || {
            task(&session);
            session.scheduler.task_finished();
            if session.scheduler.leave() {
                session.on_idle();
            }
        });
    }

    /// Get or create the dispatcher of a category
    ///
    /// A newly created dispatcher is counted as active and started.
    pub fn request(self: &Arc<Self>, category: MatchCategory) -> Arc<Dispatcher> {
        let greedy = self
            .grammar
            .symbol(category.symbol)
            .map(|s| s.is_greedy())
            .unwrap_or(false);
        let (dispatcher, created) = self
            .table
            .get_or_create(category, |id| Dispatcher::new(id, category, greedy));

        if created {
            self.active.fetch_add(1, Ordering::AcqRel);
            log_trace!("created dispatcher {} for {}", dispatcher.id(), category);
            dispatcher.start(self);
        }
        dispatcher
    }

    /// Look up a dispatcher by id
    #[inline]
    pub fn dispatcher(&self, id: DispatcherId) -> Arc<Dispatcher> {
        self.table.get(id)
    }

    /// Every dispatcher created so far
    pub fn dispatchers(&self) -> Vec<Arc<Dispatcher>> {
        self.table.snapshot()
    }

    /// Remember which categories one walker asked for together
    pub fn record_site(&self, site: Vec<MatchCategory>) {
        if !site.is_empty() {
            self.sites.lock().push(site);
        }
    }

    pub fn walker_started(&self) {
        self.walkers.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one dispatcher as completed
    ///
    /// # Panics
    /// Panics if no dispatcher was active.
    pub fn dispatcher_completed(&self) {
        let previous = self.active.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "active dispatcher counter underflow");
    }

    /// Called on the pool's 1 -> 0 transition for this parse
    fn on_idle(self: &Arc<Self>) {
        loop {
            self.scheduler.enter();

            if self.active.load(Ordering::Acquire) == 0 {
                // The unit taken above is never given back, so a
                // finished session can never turn idle again.
                self.finish();
                return;
            }

            self.breaker_rounds.fetch_add(1, Ordering::Relaxed);
            let forced = breaker::resolve(self);
            assert!(
                forced > 0,
                "parse stalled with {} active categories and none to force",
                self.active.load(Ordering::Acquire)
            );
            self.forced.fetch_add(forced as u64, Ordering::Relaxed);

            if !self.scheduler.leave() {
                return;
            }
        }
    }

    /// Aggregate every dispatcher into the outcome and wake joiners
    fn finish(&self) {
        let dispatchers = self.table.snapshot();

        let mut nodes: FastMap<MatchClass, Vec<Match>> = FastMap::default();
        let mut lengths: FastMap<MatchCategory, Vec<usize>> = FastMap::default();
        let mut succeeded: FastSet<MatchCategory> = FastSet::default();
        let mut queried = Vec::with_capacity(dispatchers.len());

        for dispatcher in &dispatchers {
            let category = dispatcher.category();
            let results = dispatcher.take_results();
            queried.push(category);

            if !results.published.is_empty() {
                succeeded.insert(category);
            }
            for m in results.matches {
                if results.published.contains(&m.class) {
                    nodes.entry(m.class).or_default().push(m);
                }
            }
            lengths.insert(
                category,
                results.published.iter().map(|c| c.length).collect(),
            );
        }
        for matches in nodes.values_mut() {
            matches.sort();
            matches.dedup();
        }

        let mut sites = std::mem::take(&mut *self.sites.lock());
        sites.push(vec![self.root.category]);
        let errors = rank_possible_errors(&queried, &succeeded, &sites);

        let graph = AbstractSyntaxGraph::pruned(self.root, nodes);
        let (table_hits, _, table_hit_rate) = self.table.stats();
        let stats = ParseStats {
            categories: self.table.len(),
            table_hits,
            table_hit_rate,
            tasks_run: self.scheduler.tasks_run(),
            walkers: self.walkers.load(Ordering::Relaxed),
            breaker_rounds: self.breaker_rounds.load(Ordering::Relaxed),
            forced_categories: self.forced.load(Ordering::Relaxed),
        };

        log_debug!(
            "parse of {} finished: {} nodes, {} possible errors, {} categories",
            self.root,
            graph.len(),
            errors.len(),
            stats.categories
        );

        *self.outcome.lock() = Some(ParseOutcome {
            graph,
            errors,
            lengths,
            stats,
        });
        self.finished.notify_all();
    }
}

/// Parser facade owning a grammar and a worker pool
///
/// One engine can run any number of parses, concurrently or one after
/// another; they share the pool but nothing else.
pub struct ParseEngine {
    grammar: Arc<Grammar>,
    pool: Arc<ThreadPool>,
    config: EngineConfig,
}

impl ParseEngine {
    /// Create an engine, building its worker pool
    pub fn new(grammar: Arc<Grammar>, config: EngineConfig) -> Result<Self, ParseError> {
        let pool = build_pool(config.num_threads, &config.thread_name_prefix).map_err(|e| {
            ParseError::ThreadPool {
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            grammar,
            pool: Arc::new(pool),
            config,
        })
    }

    /// The engine's grammar
    #[inline]
    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    /// The engine's configuration
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start parsing `document` as `root`
    ///
    /// `range` is `(start, length)` in code points; by default the whole
    /// document. Returns as soon as the parse is running.
    ///
    /// The graph only holds derivations of exactly that span. A root that
    /// matches a shorter prefix (a greedy `number` on `"123a"`) gives an
    /// empty graph; [`ParseOutcome::match_lengths`] still lists the
    /// lengths that did match.
    pub fn parse(
        &self,
        document: impl Into<Document>,
        root: SymbolId,
        range: Option<(usize, usize)>,
    ) -> Result<Parse, ParseError> {
        let document: Document = document.into();

        if self.config.max_input_size > 0 && document.len() > self.config.max_input_size {
            return Err(ParseError::InputTooLarge {
                input_size: document.len(),
                max_size: self.config.max_input_size,
            });
        }
        if self.grammar.symbol(root).is_none() {
            return Err(ParseError::UnknownSymbol { id: root.0 });
        }

        let (start, length) = range.unwrap_or((0, document.len()));
        let in_bounds = start
            .checked_add(length)
            .map(|end| end <= document.len())
            .unwrap_or(false);
        if !in_bounds {
            return Err(ParseError::RangeOutOfBounds {
                start,
                length,
                document_length: document.len(),
            });
        }

        let root_class = MatchClass::new(start, root, length);
        log_debug!(
            "starting parse of {} over {} code points",
            root_class,
            document.len()
        );

        let session = Arc::new(Session::new(
            Arc::clone(&self.grammar),
            document,
            root_class,
            Arc::clone(&self.pool),
        ));
        session.spawn(move |session| {
            session.request(root_class.category);
        });

        Ok(Parse { session })
    }

    /// Parse a whole string as the symbol named `root` and wait for it
    pub fn parse_str(&self, input: &str, root: &str) -> Result<ParseOutcome, ParseError> {
        let root = self.grammar.require(root)?;
        Ok(self.parse(input, root, None)?.join())
    }
}

/// Handle to a running parse
///
/// Must not be joined from inside the engine's own pool.
pub struct Parse {
    session: Arc<Session>,
}

impl Parse {
    /// The span the parse is asked to cover
    pub fn root(&self) -> MatchClass {
        self.session.root
    }

    /// Whether the outcome is ready
    pub fn is_finished(&self) -> bool {
        self.session.outcome.lock().is_some()
    }

    /// Block until the parse is finished
    pub fn join(self) -> ParseOutcome {
        let mut slot = self.session.outcome.lock();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            self.session.finished.wait(&mut slot);
        }
    }
}

/// Everything a finished parse produced
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    graph: AbstractSyntaxGraph,
    errors: Vec<PossibleError>,
    lengths: FastMap<MatchCategory, Vec<usize>>,
    stats: ParseStats,
}

impl ParseOutcome {
    /// The pruned abstract syntax graph
    #[inline]
    pub fn abstract_syntax_graph(&self) -> &AbstractSyntaxGraph {
        &self.graph
    }

    /// Categories that were queried but never matched, most relevant first
    pub fn possible_errors(&self) -> Vec<MatchCategory> {
        self.errors.iter().map(|e| e.category).collect()
    }

    /// Possible errors with their bypassed flag
    #[inline]
    pub fn diagnostics(&self) -> &[PossibleError] {
        &self.errors
    }

    /// Published lengths of a queried category, before pruning
    ///
    /// Empty for categories that were never queried or never matched.
    pub fn match_lengths(&self, category: MatchCategory) -> &[usize] {
        self.lengths
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a category was queried during the parse
    pub fn was_queried(&self, category: MatchCategory) -> bool {
        self.lengths.contains_key(&category)
    }

    /// Counters of the parse
    #[inline]
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Render the rightmost unbypassed failures of an unsuccessful parse
    ///
    /// Returns `None` when the parse succeeded.
    pub fn error_report(&self, grammar: &Grammar, document: &Document) -> Option<RichError> {
        if !self.graph.is_empty() {
            return None;
        }

        let root = self.graph.root();
        let mut builder = ErrorBuilder::new(format!(
            "Failed to match {}",
            grammar.name(root.symbol())
        ))
        .span(Span::of(document, root.position(), root.end()));

        let frontier = self
            .errors
            .iter()
            .filter(|e| !e.bypassed)
            .map(|e| e.position())
            .max();

        if let Some(position) = frontier {
            for error in self
                .errors
                .iter()
                .filter(|e| !e.bypassed && e.position() == position)
            {
                builder = builder.child(RichError::expected(
                    grammar.name(error.symbol()),
                    Span::of(document, position, position),
                ));
            }
        }

        Some(builder.build())
    }
}
