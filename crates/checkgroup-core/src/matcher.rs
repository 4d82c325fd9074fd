//! Anchored name and event pattern matching.
//!
//! Every pattern is wrapped as `^(?:pattern)$`, so `build` never matches
//! `build-docs`; write `build.*` for that. Patterns are compiled once at
//! startup and reused for every poll tick.

use regex::Regex;

use crate::error::{CheckGroupError, Result};

/// An ordered list of compiled, whole-string patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    regexes: Vec<Regex>,
}

impl PatternSet {
    /// Compile `patterns`, anchoring each at both ends.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let regexes = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{p})$")).map_err(|source| {
                    CheckGroupError::InvalidPattern {
                        pattern: p.to_string(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { regexes })
    }

    pub fn is_empty(&self) -> bool {
        self.regexes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regexes.len()
    }

    /// `true` when any pattern matches the whole of `candidate`.
    pub fn matches_any(&self, candidate: &str) -> bool {
        self.regexes.iter().any(|r| r.is_match(candidate))
    }
}

/// Decides which check names are wanted in the aggregate.
#[derive(Debug, Clone, Default)]
pub struct CheckMatcher {
    include: PatternSet,
    exclude: PatternSet,
}

impl CheckMatcher {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Self {
            include: PatternSet::compile(include)?,
            exclude: PatternSet::compile(exclude)?,
        })
    }

    /// A name is wanted iff it matches an inclusion pattern and no exclusion
    /// pattern. An empty inclusion list wants nothing.
    pub fn is_wanted(&self, name: &str) -> bool {
        self.include.matches_any(name) && !self.exclude.matches_any(name)
    }
}
