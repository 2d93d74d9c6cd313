//! Integration tests for the parse engine
//!
//! These tests run whole parses on small grammars and check the shape of
//! the resulting graph, the possible errors and the engine counters.

use ambiparse::engine::builder::{choice, plus, seq, star, sym, GrammarBuilder};
use ambiparse::engine::grammar::{Nfa, StateId, SymbolId, Terminal};
use ambiparse::engine::{
    AbstractSyntaxGraph, Document, EngineConfig, MatchCategory, MatchClass, ParseEngine,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

fn engine(builder: GrammarBuilder) -> ParseEngine {
    let grammar = Arc::new(builder.build().unwrap());
    ParseEngine::new(grammar, EngineConfig::new().with_num_threads(4)).unwrap()
}

fn reachable(asg: &AbstractSyntaxGraph) -> HashSet<MatchClass> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([asg.root()]);
    while let Some(class) = queue.pop_front() {
        if !seen.insert(class) {
            continue;
        }
        for m in asg.get(&class).unwrap_or(&[]) {
            queue.extend(m.children.iter().copied());
        }
    }
    seen
}

// ============================================================================
// End-to-End Tests
// ============================================================================

#[test]
fn test_digit_sum() {
    let mut b = GrammarBuilder::new();
    let digits: Vec<_> = ('0'..='9')
        .map(|c| sym(b.literal(&c.to_string())))
        .collect();
    let digit = b.production("digit", choice(digits));
    let plus_sign = b.literal("+");
    let sum = b.production("sum", seq([sym(digit), sym(plus_sign), sym(digit)]));
    let engine = engine(b);

    let outcome = engine.parse("3+4", sum, Some((0, 3))).unwrap().join();
    let asg = outcome.abstract_syntax_graph();

    assert_eq!(asg.root(), MatchClass::new(0, sum, 3));
    let matches = asg.get(&asg.root()).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(
        matches[0].children,
        vec![
            MatchClass::new(0, digit, 1),
            MatchClass::new(1, plus_sign, 1),
            MatchClass::new(2, digit, 1),
        ]
    );
}

#[test]
fn test_terminal_match_appears_in_graph() {
    let mut b = GrammarBuilder::new();
    let word = b.terminal("word", Terminal::literal("héllo"));
    let bang = b.terminal("bang", Terminal::set("!?"));
    let greeting = b.production("greeting", seq([sym(word), sym(bang)]));
    let engine = engine(b);

    let asg = engine
        .parse("héllo?", greeting, None)
        .unwrap()
        .join()
        .abstract_syntax_graph()
        .clone();

    assert!(asg.contains(&MatchClass::new(0, word, 5)));
    assert!(asg.contains(&MatchClass::new(5, bang, 1)));
    assert!(asg.get(&MatchClass::new(5, bang, 1)).unwrap()[0]
        .children
        .is_empty());
}

#[test]
fn test_greedy_digits() {
    let mut b = GrammarBuilder::new();
    let digit = b.terminal("digit", Terminal::range('0', '9'));
    let digits = b.greedy_production("greedyDigits", plus(sym(digit)));
    let engine = engine(b);

    // Over the whole document only the 3-digit prefix is reported
    let outcome = engine.parse("123a", digits, None).unwrap().join();
    assert!(outcome.abstract_syntax_graph().is_empty());
    assert_eq!(outcome.match_lengths(MatchCategory::new(0, digits)), &[3]);

    let outcome = engine.parse("123a", digits, Some((0, 3))).unwrap().join();
    let asg = outcome.abstract_syntax_graph();
    assert_eq!(asg.root(), MatchClass::new(0, digits, 3));
    assert!(!asg.is_empty());
    assert!(!asg.contains(&MatchClass::new(0, digits, 1)));
    assert!(!asg.contains(&MatchClass::new(0, digits, 2)));
}

#[test]
fn test_non_greedy_reports_every_length() {
    let mut b = GrammarBuilder::new();
    let digit = b.terminal("digit", Terminal::range('0', '9'));
    let digits = b.production("digits", plus(sym(digit)));
    let engine = engine(b);

    let outcome = engine.parse("123a", digits, None).unwrap().join();
    let mut lengths = outcome.match_lengths(MatchCategory::new(0, digits)).to_vec();
    lengths.sort();
    assert_eq!(lengths, vec![1, 2, 3]);
}

// ============================================================================
// Ambiguity Tests
// ============================================================================

#[test]
fn test_two_derivations_of_one_span() {
    // s := 'a' 'b' | p ;  p := 'a' 'b'
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let bb = b.literal("b");
    let p = b.production("p", seq([sym(a), sym(bb)]));
    let s = b.production("s", choice([seq([sym(a), sym(bb)]), sym(p)]));
    let engine = engine(b);

    let outcome = engine.parse("ab", s, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();

    assert_eq!(asg.get(&asg.root()).unwrap().len(), 2);
    assert!(asg.is_ambiguous());
}

#[test]
fn test_ambiguous_expression() {
    // expr := expr '+' expr | digit
    let mut b = GrammarBuilder::new();
    let digit = b.terminal("digit", Terminal::range('0', '9'));
    let plus_sign = b.literal("+");
    let expr = b.declare("expr");
    b.define(
        expr,
        choice([seq([sym(expr), sym(plus_sign), sym(expr)]), sym(digit)]),
    );
    let engine = engine(b);

    let outcome = engine.parse("1+2+3", expr, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();
    let roots = asg.get(&asg.root()).unwrap();

    assert_eq!(roots.len(), 2);
    let splits: HashSet<_> = roots.iter().map(|m| m.children[0].length).collect();
    assert_eq!(splits, HashSet::from([1, 3]));
    assert!(outcome.stats().forced_categories > 0);
}

#[test]
fn test_greedy_keeps_all_maximal_matches() {
    // g := 'ab' | 'abcde' | 'abcd' 'e' | 'abc'   (greedy)
    let mut b = GrammarBuilder::new();
    let ab = b.literal("ab");
    let abcde = b.literal("abcde");
    let abcd = b.literal("abcd");
    let e = b.literal("e");
    let abc = b.literal("abc");
    let g = b.greedy_production(
        "g",
        choice([sym(ab), sym(abcde), seq([sym(abcd), sym(e)]), sym(abc)]),
    );
    let engine = engine(b);

    let outcome = engine.parse("abcde", g, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();

    assert_eq!(outcome.match_lengths(MatchCategory::new(0, g)), &[5]);
    assert_eq!(asg.get(&MatchClass::new(0, g, 5)).unwrap().len(), 2);
    for length in [2, 3] {
        assert!(!asg.contains(&MatchClass::new(0, g, length)));
    }
}

// ============================================================================
// Memoization Tests
// ============================================================================

#[test]
fn test_shared_category_is_evaluated_once() {
    // s := p 'a' | q 'a' ;  p := d ;  q := d
    let mut b = GrammarBuilder::new();
    let d = b.terminal("d", Terminal::Any);
    let a = b.literal("a");
    let p = b.production("p", sym(d));
    let q = b.production("q", sym(d));
    let s = b.production(
        "s",
        choice([seq([sym(p), sym(a)]), seq([sym(q), sym(a)])]),
    );
    let engine = engine(b);

    let outcome = engine.parse("xa", s, None).unwrap().join();
    let stats = outcome.stats();

    // s@0, p@0, q@0, d@0, a@1
    assert_eq!(stats.categories, 5);
    assert_eq!(stats.table_hits, 2);
    assert_eq!(
        outcome.abstract_syntax_graph().get(&MatchClass::new(0, s, 2)).unwrap().len(),
        2
    );
}

#[test]
fn test_repeated_parses_are_identical() {
    let mut b = GrammarBuilder::new();
    let digit = b.terminal("digit", Terminal::range('0', '9'));
    let plus_sign = b.literal("+");
    let expr = b.declare("expr");
    b.define(
        expr,
        choice([seq([sym(expr), sym(plus_sign), sym(expr)]), sym(digit)]),
    );
    let engine = engine(b);

    let first = engine
        .parse("1+2+3+4", expr, None)
        .unwrap()
        .join()
        .abstract_syntax_graph()
        .to_json()
        .unwrap();
    for _ in 0..5 {
        let again = engine
            .parse("1+2+3+4", expr, None)
            .unwrap()
            .join()
            .abstract_syntax_graph()
            .to_json()
            .unwrap();
        assert_eq!(again, first);
    }
}

// ============================================================================
// Pruning Tests
// ============================================================================

#[test]
fn test_every_node_is_reachable_from_root() {
    // s := x* ; with x := 'a' | 'aa'
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let aa = b.literal("aa");
    let x = b.production("x", choice([sym(a), sym(aa)]));
    let s = b.production("s", star(sym(x)));
    let engine = engine(b);

    let outcome = engine.parse("aaaa", s, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();
    assert!(!asg.is_empty());

    let reached = reachable(asg);
    for (class, _) in asg.nodes() {
        assert!(reached.contains(class), "{} is not reachable", class);
    }
    // s@0..2 was matched but only s@0..4 is the root
    assert!(!asg.contains(&MatchClass::new(0, s, 2)));
    assert!(outcome.match_lengths(MatchCategory::new(0, s)).contains(&2));
}

// ============================================================================
// Cyclic Grammar Tests
// ============================================================================

#[test]
fn test_left_recursion_with_base_case() {
    // A := A 'x' | 'x'
    let mut b = GrammarBuilder::new();
    let x = b.literal("x");
    let a = b.declare("A");
    b.define(a, choice([seq([sym(a), sym(x)]), sym(x)]));
    let engine = engine(b);

    let outcome = engine.parse("xxx", a, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();

    assert!(!asg.is_empty());
    let full = asg.get(&MatchClass::new(0, a, 3)).unwrap();
    assert_eq!(full.len(), 1);
    assert_eq!(
        full[0].children,
        vec![MatchClass::new(0, a, 2), MatchClass::new(2, x, 1)]
    );
    assert!(outcome.stats().breaker_rounds > 0);
}

#[test]
fn test_left_recursion_without_base_case() {
    // A := A 'x'
    let mut b = GrammarBuilder::new();
    let x = b.literal("x");
    let a = b.declare("A");
    b.define(a, seq([sym(a), sym(x)]));
    let engine = engine(b);

    let outcome = engine.parse("x", a, None).unwrap().join();
    assert!(outcome.abstract_syntax_graph().is_empty());
    assert_eq!(outcome.possible_errors(), vec![MatchCategory::new(0, a)]);
    assert_eq!(outcome.stats().forced_categories, 1);
}

#[test]
fn test_greedy_left_recursion_stops_at_forced_length() {
    // A := A 'x' | 'x', greedy
    let mut b = GrammarBuilder::new();
    let x = b.literal("x");
    let a = b.declare("A");
    b.define_greedy(a, choice([seq([sym(a), sym(x)]), sym(x)]));
    let engine = engine(b);

    let outcome = engine.parse("xxx", a, None).unwrap().join();

    // A@0 is completed by the breaker with only its base case, and longer
    // matches found afterwards are not published
    assert_eq!(outcome.match_lengths(MatchCategory::new(0, a)), &[1]);
    assert!(outcome.abstract_syntax_graph().is_empty());
    assert_eq!(outcome.stats().forced_categories, 1);

    let prefix = engine.parse("xxx", a, Some((0, 1))).unwrap().join();
    assert!(!prefix.abstract_syntax_graph().is_empty());
}

#[test]
fn test_mutual_recursion() {
    // a := b 'x' | 'x' ;  b := a 'y'
    let mut bld = GrammarBuilder::new();
    let x = bld.literal("x");
    let y = bld.literal("y");
    let a = bld.declare("a");
    let b = bld.declare("b");
    bld.define(a, choice([seq([sym(b), sym(x)]), sym(x)]));
    bld.define(b, seq([sym(a), sym(y)]));
    let engine = engine(bld);

    let outcome = engine.parse("xyxyx", a, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();
    assert!(!asg.is_empty());
    assert!(asg.contains(&MatchClass::new(0, b, 4)));
}

#[test]
fn test_nullable_self_reference_terminates() {
    // A := A | 'x' | ε
    let mut b = GrammarBuilder::new();
    let x = b.literal("x");
    let a = b.declare("A");
    let mut nfa = Nfa::new(3);
    nfa.add_start(StateId(0))
        .add_accept(StateId(0))
        .add_accept(StateId(1))
        .add_accept(StateId(2))
        .add_transition(StateId(0), a, StateId(1))
        .add_transition(StateId(0), x, StateId(2));
    b.define_nfa(a, nfa, false);
    let engine = engine(b);

    let outcome = engine.parse("x", a, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();
    assert!(!asg.is_empty());
    assert!(asg.is_ambiguous());
    assert_eq!(
        outcome.match_lengths(MatchCategory::new(0, a)).len(),
        2,
        "both the empty and the one-character match are published"
    );
}

// ============================================================================
// Error Reporting Tests
// ============================================================================

#[test]
fn test_possible_errors_order() {
    // s := 'a' 'b' 'c' | 'a' 'd'
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let bb = b.literal("b");
    let c = b.literal("c");
    let d = b.literal("d");
    let s = b.production(
        "s",
        choice([seq([sym(a), sym(bb), sym(c)]), seq([sym(a), sym(d)])]),
    );
    let engine = engine(b);

    let document = Document::from("abx");
    let outcome = engine.parse(document.clone(), s, None).unwrap().join();
    assert!(outcome.abstract_syntax_graph().is_empty());

    // c@2 failed alone; d@1 lost to its sibling b@1
    let diagnostics = outcome.diagnostics();
    let order: Vec<_> = diagnostics.iter().map(|e| (e.category, e.bypassed)).collect();
    assert_eq!(
        order,
        vec![
            (MatchCategory::new(2, c), false),
            (MatchCategory::new(0, s), false),
            (MatchCategory::new(1, d), true),
        ]
    );

    let report = outcome
        .error_report(engine.grammar(), &document)
        .unwrap();
    assert_eq!(report.children.len(), 1);
    assert_eq!(report.children[0].message, "Expected \"c\"");
    let rendered = report.format_with_source(&document);
    assert!(rendered.starts_with("Error at line 1, column 3:\nabx\n  ^\n"));
}

#[test]
fn test_successful_parse_has_no_report() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let s = b.production("s", sym(a));
    let engine = engine(b);

    let document = Document::from("a");
    let outcome = engine.parse(document.clone(), s, None).unwrap().join();
    assert!(outcome.error_report(engine.grammar(), &document).is_none());
}

#[test]
fn test_empty_document() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let s = b.production("s", star(sym(a)));
    let t = b.production("t", plus(sym(a)));
    let engine = engine(b);

    let outcome = engine.parse("", s, None).unwrap().join();
    let asg = outcome.abstract_syntax_graph();
    assert_eq!(asg.root(), MatchClass::new(0, s, 0));
    assert!(asg.get(&asg.root()).unwrap()[0].children.is_empty());

    assert!(engine
        .parse("", t, None)
        .unwrap()
        .join()
        .abstract_syntax_graph()
        .is_empty());
}

#[test]
fn test_symbol_lookup_by_name() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    b.production("s", plus(sym(a)));
    let engine = engine(b);

    let s: SymbolId = engine.grammar().require("s").unwrap();
    let parse = engine.parse("aaa", s, None).unwrap();
    assert_eq!(parse.root(), MatchClass::new(0, s, 3));
    let outcome = parse.join();
    assert!(!outcome.abstract_syntax_graph().is_empty());
}
