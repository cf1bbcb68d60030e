//! Matchers
//!
//! A matcher tests the request against a pattern and, on success, yields the
//! variables its children can reference: `0` is the whole match, `1..n` the
//! captured groups.

use super::Parameters;
use crate::error::ProcessingError;
use crate::sitemap::environment::Environment;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

pub trait Matcher: Send + Sync {
    /// Variables of a successful match, `None` when the pattern does not match
    fn matches(
        &self,
        pattern: &str,
        env: &dyn Environment,
        parameters: &Parameters,
    ) -> Result<Option<Parameters>, ProcessingError>;

    /// Validate a pattern known when the tree is compiled
    fn check_pattern(&self, _pattern: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Compiled patterns, shared by all requests
struct PatternCache {
    compiled: Mutex<LruCache<String, Arc<Regex>>>,
}

impl PatternCache {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        PatternCache {
            compiled: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn get_or_compile<F>(&self, pattern: &str, translate: F) -> Result<Arc<Regex>, ProcessingError>
    where
        F: FnOnce(&str) -> String,
    {
        let mut cache = self
            .compiled
            .lock()
            .map_err(|_| ProcessingError::LockPoisoned)?;
        if let Some(regex) = cache.get(pattern) {
            return Ok(Arc::clone(regex));
        }
        let regex = Regex::new(&translate(pattern))
            .map_err(|err| ProcessingError::pipeline(format!("invalid pattern '{}': {}", pattern, err)))?;
        let regex = Arc::new(regex);
        cache.put(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }
}

fn captures_to_parameters(regex: &Regex, input: &str) -> Option<Parameters> {
    let captures = regex.captures(input)?;
    let mut result = Parameters::new();
    for (index, group) in captures.iter().enumerate() {
        result.insert(
            index.to_string(),
            group.map(|m| m.as_str()).unwrap_or("").to_string(),
        );
    }
    for name in regex.capture_names().flatten() {
        if let Some(group) = captures.name(name) {
            result.insert(name.to_string(), group.as_str().to_string());
        }
    }
    Some(result)
}

/// Translate a wildcard pattern into an anchored regular expression.
///
/// `*` matches within one path segment, `**` across segments, `\` escapes
/// the next character.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str("(.*)");
            }
            '*' => out.push_str("([^/]*)"),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

/// Matches the request URI against a wildcard pattern
pub struct WildcardMatcher {
    cache: PatternCache,
}

impl WildcardMatcher {
    pub fn new(cache_size: usize) -> Self {
        WildcardMatcher {
            cache: PatternCache::new(cache_size),
        }
    }
}

impl Matcher for WildcardMatcher {
    fn matches(
        &self,
        pattern: &str,
        env: &dyn Environment,
        _parameters: &Parameters,
    ) -> Result<Option<Parameters>, ProcessingError> {
        let regex = self.cache.get_or_compile(pattern, wildcard_to_regex)?;
        Ok(captures_to_parameters(&regex, env.uri()))
    }
}

/// Matches the request URI against a regular expression
pub struct RegexpMatcher {
    cache: PatternCache,
}

impl RegexpMatcher {
    pub fn new(cache_size: usize) -> Self {
        RegexpMatcher {
            cache: PatternCache::new(cache_size),
        }
    }
}

impl Matcher for RegexpMatcher {
    fn matches(
        &self,
        pattern: &str,
        env: &dyn Environment,
        _parameters: &Parameters,
    ) -> Result<Option<Parameters>, ProcessingError> {
        let regex = self.cache.get_or_compile(pattern, str::to_string)?;
        Ok(captures_to_parameters(&regex, env.uri()))
    }

    fn check_pattern(&self, pattern: &str) -> Result<(), String> {
        Regex::new(pattern).map(|_| ()).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::environment::RequestEnvironment;

    #[test]
    fn test_wildcard_translation() {
        assert_eq!(wildcard_to_regex("*.html"), r"^([^/]*)\.html$");
        assert_eq!(wildcard_to_regex("docs/**"), "^docs/(.*)$");
        assert_eq!(wildcard_to_regex(r"a\*b"), r"^a\*b$");
    }

    #[test]
    fn test_wildcard_groups() {
        let matcher = WildcardMatcher::new(8);
        let env = RequestEnvironment::new("docs/guide/intro.html");
        let found = matcher
            .matches("docs/**/*.html", &env, &Parameters::new())
            .unwrap()
            .unwrap();
        assert_eq!(found["0"], "docs/guide/intro.html");
        assert_eq!(found["1"], "guide");
        assert_eq!(found["2"], "intro");
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let matcher = WildcardMatcher::new(8);
        let env = RequestEnvironment::new("a/b.html");
        assert!(matcher.matches("*.html", &env, &Parameters::new()).unwrap().is_none());
    }

    #[test]
    fn test_regexp_named_groups() {
        let matcher = RegexpMatcher::new(8);
        let env = RequestEnvironment::new("item-42");
        let found = matcher
            .matches(r"^item-(?P<id>\d+)$", &env, &Parameters::new())
            .unwrap()
            .unwrap();
        assert_eq!(found["1"], "42");
        assert_eq!(found["id"], "42");
    }

    #[test]
    fn test_regexp_check_pattern() {
        let matcher = RegexpMatcher::new(8);
        assert!(matcher.check_pattern("(unclosed").is_err());
        assert!(matcher.check_pattern("ok+").is_ok());
    }

    #[test]
    fn test_cache_evicts_but_still_matches() {
        let matcher = WildcardMatcher::new(1);
        let env = RequestEnvironment::new("x.css");
        for _ in 0..3 {
            assert!(matcher.matches("*.css", &env, &Parameters::new()).unwrap().is_some());
            assert!(matcher.matches("*.js", &env, &Parameters::new()).unwrap().is_none());
        }
    }
}
