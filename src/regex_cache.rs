//! Regex compilation helpers
//!
//! Built-in line shapes are string constants compiled once into statics via
//! [`builtin`]. Caller-supplied patterns (extra noise rules from
//! configuration) go through the thread-local cache so the same pattern is
//! never compiled twice and invalid patterns surface as `None` instead of a
//! panic.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Thread-local cache of compiled caller-supplied patterns
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Compile a built-in pattern
///
/// # Panics
///
/// Panics if the pattern is invalid. Built-in patterns are constants covered
/// by the test suite, so this only fires on a programming error.
pub fn builtin(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => panic!("invalid built-in pattern {:?}: {}", pattern, e),
    }
}

/// Get or compile a caller-supplied pattern
///
/// Returns `None` for an invalid pattern. Invalid patterns are not cached.
pub fn get_or_compile(pattern: &str) -> Option<Regex> {
    let cached = REGEX_CACHE.with(|cache| cache.borrow().get(pattern).cloned());
    if cached.is_some() {
        return cached;
    }

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            log_debug!("rejecting noise pattern {:?}: {}", pattern, e);
            return None;
        }
    };
    REGEX_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .insert(pattern.to_string(), regex.clone())
    });
    Some(regex)
}

/// Clear the cache
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached patterns on this thread
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
