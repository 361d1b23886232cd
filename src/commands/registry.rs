//! Wildcard pattern registry
//!
//! Each pattern is compiled once at registration into a case-insensitive,
//! full-string regex: `*` becomes a `(.+)` capture and literal whitespace
//! becomes `\s+`. Iteration order is registration order; re-registering a
//! pattern replaces it in place.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use regex::Regex;

use super::types::{CommandPattern, HandlerName, PatternConfig};
use crate::{Error, Result};

/// A pattern paired with its compiled matcher
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub pattern: Arc<CommandPattern>,
    pub(crate) regex: Regex,
}

/// Registry of command patterns keyed by pattern text
#[derive(Debug, Default)]
pub struct PatternRegistry {
    entries: Vec<CompiledPattern>,
    index: HashMap<String, usize>,
}

impl PatternRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a pattern
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern is blank or cannot be
    /// compiled, and [`Error::InvalidHandler`] if the handler name is blank.
    pub fn register(&mut self, pattern: &str, config: PatternConfig) -> Result<Arc<CommandPattern>> {
        let key = pattern.trim();
        if key.is_empty() {
            return Err(Error::InvalidPattern("pattern must be non-empty".to_string()));
        }

        let handler = HandlerName::parse(&config.handler).ok_or_else(|| {
            Error::InvalidHandler(format!("pattern {key:?} has no handler name"))
        })?;

        let regex = compile(key)?;
        let pattern = Arc::new(CommandPattern {
            pattern: key.to_string(),
            handler,
            category: config.category.unwrap_or_default(),
            importance: config.importance.unwrap_or_default(),
            requires_confirmation: config.requires_confirmation.unwrap_or(false),
            contexts: config
                .contexts
                .iter()
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect::<BTreeSet<_>>(),
        });

        let entry = CompiledPattern {
            pattern: Arc::clone(&pattern),
            regex,
        };

        if let Some(&slot) = self.index.get(key) {
            tracing::debug!(pattern = %key, "replacing command pattern");
            self.entries[slot] = entry;
        } else {
            self.index.insert(key.to_string(), self.entries.len());
            self.entries.push(entry);
        }

        Ok(pattern)
    }

    /// Look up a pattern by its text
    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<Arc<CommandPattern>> {
        self.index
            .get(pattern.trim())
            .map(|&slot| Arc::clone(&self.entries[slot].pattern))
    }

    /// Compiled patterns in registration order
    pub fn iter(&self) -> impl Iterator<Item = &CompiledPattern> {
        self.entries.iter()
    }

    /// Snapshot of all patterns in registration order
    #[must_use]
    pub fn patterns(&self) -> Vec<Arc<CommandPattern>> {
        self.entries.iter().map(|e| Arc::clone(&e.pattern)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the matching rule for a wildcard pattern
///
/// Wildcards also span line breaks inside the utterance.
fn compile(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split_whitespace()
        .map(|token| {
            token
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("(.+)")
        })
        .collect::<Vec<_>>()
        .join(r"\s+");

    Regex::new(&format!("(?is)^{body}$"))
        .map_err(|e| Error::InvalidPattern(format!("{pattern:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Category, Importance};

    #[test]
    fn register_fills_defaults() {
        let mut registry = PatternRegistry::new();
        let pattern = registry
            .register("go to *", PatternConfig::new("navigate_to"))
            .unwrap();

        assert_eq!(pattern.handler.as_str(), "navigate_to");
        assert_eq!(pattern.category, Category::Interaction);
        assert_eq!(pattern.importance, Importance::Medium);
        assert!(!pattern.requires_confirmation);
        assert!(pattern.contexts.is_empty());
    }

    #[test]
    fn rejects_blank_pattern_and_handler() {
        let mut registry = PatternRegistry::new();
        assert!(matches!(
            registry.register("  ", PatternConfig::new("h")),
            Err(Error::InvalidPattern(_))
        ));
        assert!(matches!(
            registry.register("help", PatternConfig::new("")),
            Err(Error::InvalidHandler(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut registry = PatternRegistry::new();
        registry.register("first", PatternConfig::new("a")).unwrap();
        registry.register("second", PatternConfig::new("b")).unwrap();
        registry
            .register("first", PatternConfig::new("c").importance(Importance::High))
            .unwrap();

        assert_eq!(registry.len(), 2);
        let order: Vec<_> = registry.iter().map(|e| e.pattern.pattern.clone()).collect();
        assert_eq!(order, vec!["first", "second"]);

        let first = registry.get("first").unwrap();
        assert_eq!(first.handler.as_str(), "c");
        assert_eq!(first.importance, Importance::High);
    }

    #[test]
    fn compiled_rule_escapes_literals() {
        let regex = compile("what is 2+2?").unwrap();
        assert!(regex.is_match("what is 2+2?"));
        assert!(!regex.is_match("what is 22"));
    }

    #[test]
    fn compiled_rule_is_full_string_and_flexible_whitespace() {
        let regex = compile("open   *").unwrap();
        assert!(regex.is_match("open\t settings"));
        assert!(regex.is_match("OPEN Settings"));
        assert!(!regex.is_match("please open settings"));
    }

    #[test]
    fn contexts_are_normalized() {
        let mut registry = PatternRegistry::new();
        let pattern = registry
            .register("save", PatternConfig::new("save").context(" Editor ").context(""))
            .unwrap();
        assert_eq!(pattern.contexts.iter().collect::<Vec<_>>(), vec!["editor"]);
    }
}
