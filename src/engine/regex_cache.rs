//! Thread-local regex cache for pattern terminals
//!
//! Pattern terminals are matched on pool threads, so compiled patterns are
//! cached per thread to avoid recompilation on every match. Patterns are
//! anchored on both ends: a pattern terminal matches a code point only if
//! the whole code point matches.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Thread-local cache of compiled, anchored patterns
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

/// Check that a pattern compiles
pub fn validate(pattern: &str) -> Result<(), regex::Error> {
    Regex::new(&anchored(pattern)).map(|_| ())
}

/// Get or compile an anchored pattern
///
/// # Returns
/// * `Some(Regex)` if the pattern is valid
/// * `None` if the pattern is invalid
#[inline]
pub fn get_or_compile(pattern: &str) -> Option<Regex> {
    REGEX_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(pattern) {
            return Some(regex.clone());
        }

        match Regex::new(&anchored(pattern)) {
            Ok(regex) => {
                cache
                    .borrow_mut()
                    .insert(pattern.to_string(), regex.clone());
                Some(regex)
            }
            Err(_) => None,
        }
    })
}

/// Whether a single code point fully matches `pattern`
///
/// Invalid patterns never match.
pub fn matches_char(pattern: &str, c: char) -> bool {
    let mut buf = [0u8; 4];
    let text: &str = c.encode_utf8(&mut buf);
    get_or_compile(pattern).is_some_and(|r| r.is_match(text))
}

/// Clear this thread's cache
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of patterns cached on this thread
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
