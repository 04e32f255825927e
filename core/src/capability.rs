//! Built-in capability constraints over request metadata.

use crate::{EngineError, Selector, SelectorPredicate, MAX_PATTERN_LENGTH};
use regex::Regex;

/// The caller expects a JSON response (`Accept` lists `application/json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectsJson;

impl SelectorPredicate for ExpectsJson {
    fn evaluate(&self, selector: &Selector) -> bool {
        selector.request().header("accept").is_some_and(|accept| {
            accept
                .split(',')
                .filter_map(|entry| entry.split(';').next())
                .any(|media| media.trim().eq_ignore_ascii_case("application/json"))
        })
    }
}

/// The request was issued by script (`X-Requested-With: XMLHttpRequest`).
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAjaxRequest;

impl SelectorPredicate for IsAjaxRequest {
    fn evaluate(&self, selector: &Selector) -> bool {
        selector
            .request()
            .header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
    }
}

/// The request method is one of the accepted verbs (case-insensitive).
#[derive(Debug, Clone)]
pub struct HttpMethodIs {
    methods: Vec<String>,
}

impl HttpMethodIs {
    /// Accept any of `methods`.
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }
}

impl SelectorPredicate for HttpMethodIs {
    fn evaluate(&self, selector: &Selector) -> bool {
        let method = selector.request().method();
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// A request header matches a regular expression.
///
/// A missing header never matches.
#[derive(Debug, Clone)]
pub struct HeaderMatches {
    name: String,
    pattern: Regex,
}

impl HeaderMatches {
    /// Compile a header matcher.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PatternTooLong`] if `pattern` exceeds [`MAX_PATTERN_LENGTH`]
    /// - [`EngineError::InvalidPattern`] if `pattern` does not compile
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, EngineError> {
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(EngineError::PatternTooLong {
                len: pattern.len(),
                max: MAX_PATTERN_LENGTH,
            });
        }
        let compiled = Regex::new(pattern).map_err(|e| EngineError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: name.into(),
            pattern: compiled,
        })
    }
}

impl SelectorPredicate for HeaderMatches {
    fn evaluate(&self, selector: &Selector) -> bool {
        selector
            .request()
            .header(&self.name)
            .is_some_and(|v| self.pattern.is_match(v))
    }
}
