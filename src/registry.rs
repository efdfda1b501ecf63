//! # Capability Registry
//!
//! Downloaders, appliers and projects are each a closed set of variants. A
//! `Registry` holds the candidates of one capability in priority order and
//! picks the variant whose applicability predicate accepts a configuration
//! record.
//!
//! - Candidates are evaluated in list order and the first match wins.
//! - In strict mode every candidate is evaluated and more than one match is
//!   reported as `AmbiguousVariant`.
//! - An optional fallback is only consulted after all candidates have been
//!   ruled out, and never takes part in the ambiguity check.

use std::fmt::Debug;

use crate::error::{Error, Result};

/// One variant of a capability.
pub trait Candidate: Copy + Debug {
    /// Configuration record the predicate is evaluated against.
    type Config: Debug;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Static applicability predicate. Must not perform I/O.
    fn applies(&self, config: &Self::Config) -> bool;
}

/// Ordered set of candidates for one capability.
#[derive(Debug, Clone)]
pub struct Registry<C: Candidate> {
    capability: &'static str,
    candidates: Vec<C>,
    fallback: Option<C>,
    strict: bool,
}

impl<C: Candidate> Registry<C> {
    /// Create a first-match-wins registry.
    pub fn new(capability: &'static str, candidates: Vec<C>) -> Self {
        Self {
            capability,
            candidates,
            fallback: None,
            strict: false,
        }
    }

    /// Enable ambiguity checking across the candidates.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Set the variant that is tried after every candidate has been ruled out.
    pub fn with_fallback(mut self, fallback: C) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// Select the variant for `config`.
    pub fn produce(&self, config: &C::Config) -> Result<C> {
        if self.strict {
            let matches: Vec<C> = self
                .candidates
                .iter()
                .copied()
                .filter(|c| c.applies(config))
                .collect();
            if matches.len() > 1 {
                return Err(Error::AmbiguousVariant {
                    capability: self.capability.to_string(),
                    variants: matches.iter().map(|c| c.name().to_string()).collect(),
                });
            }
            if let Some(found) = matches.first() {
                return Ok(*found);
            }
        } else if let Some(found) = self.candidates.iter().find(|c| c.applies(config)) {
            return Ok(*found);
        }

        match self.fallback {
            Some(fallback) if fallback.applies(config) => Ok(fallback),
            _ => Err(Error::NoMatchingVariant {
                capability: self.capability.to_string(),
                config: format!("{:?}", config),
            }),
        }
    }
}
