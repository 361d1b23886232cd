//! Utterance to pattern matching
//!
//! First match wins, in registration order. When several patterns could
//! match the same utterance, register the more specific one first.

use std::sync::Arc;

use super::registry::PatternRegistry;
use super::types::MatchResult;

/// Normalize recognized speech for matching: trimmed and lower-cased
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Find the first pattern that matches `command` in `context`
///
/// `command` is expected to already be [`normalize`]d.
#[must_use]
pub fn match_command(registry: &PatternRegistry, command: &str, context: &str) -> Option<MatchResult> {
    for entry in registry.iter() {
        if !entry.pattern.applies_to(context) {
            continue;
        }

        let Some(captures) = entry.regex.captures(command) else {
            continue;
        };

        let params = captures
            .iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().trim().to_string())
            .collect();

        tracing::debug!(
            pattern = %entry.pattern.pattern,
            handler = %entry.pattern.handler,
            "command matched"
        );

        return Some(MatchResult {
            pattern: Arc::clone(&entry.pattern),
            params,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PatternConfig;

    fn registry(patterns: &[(&str, &str)]) -> PatternRegistry {
        let mut registry = PatternRegistry::new();
        for (pattern, handler) in patterns {
            registry.register(pattern, PatternConfig::new(handler)).unwrap();
        }
        registry
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  Go To Settings \n"), "go to settings");
    }

    #[test]
    fn extracts_single_param() {
        let registry = registry(&[("go to *", "navigate_to")]);
        let m = match_command(&registry, "go to settings", "global").unwrap();
        assert_eq!(m.pattern.handler.as_str(), "navigate_to");
        assert_eq!(m.params, vec!["settings"]);
    }

    #[test]
    fn extracts_params_left_to_right() {
        let registry = registry(&[("set * to *", "set_value")]);
        let m = match_command(&registry, "set volume to high", "global").unwrap();
        assert_eq!(m.params, vec!["volume", "high"]);
    }

    #[test]
    fn multi_word_wildcard() {
        let registry = registry(&[("search for *", "search")]);
        let m = match_command(&registry, "search for rust async book", "global").unwrap();
        assert_eq!(m.params, vec!["rust async book"]);
    }

    #[test]
    fn wildcard_spans_line_breaks() {
        let registry = registry(&[("note *", "take_note")]);
        let m = match_command(&registry, &normalize("Note buy\nmilk"), "global").unwrap();
        assert_eq!(m.params, vec!["buy\nmilk"]);
    }

    #[test]
    fn wildcard_requires_at_least_one_char() {
        let registry = registry(&[("go to *", "navigate_to")]);
        assert!(match_command(&registry, "go to", "global").is_none());
    }

    #[test]
    fn first_match_wins() {
        let registry = registry(&[("open *", "open_any"), ("open settings", "open_settings")]);
        let m = match_command(&registry, "open settings", "global").unwrap();
        assert_eq!(m.pattern.handler.as_str(), "open_any");
    }

    #[test]
    fn context_restricted_patterns_are_skipped() {
        let mut registry = PatternRegistry::new();
        registry
            .register("save", PatternConfig::new("save_document").context("editor"))
            .unwrap();
        registry.register("*", PatternConfig::new("fallback")).unwrap();

        let in_editor = match_command(&registry, "save", "editor").unwrap();
        assert_eq!(in_editor.pattern.handler.as_str(), "save_document");

        let elsewhere = match_command(&registry, "save", "global").unwrap();
        assert_eq!(elsewhere.pattern.handler.as_str(), "fallback");
    }

    #[test]
    fn no_match_returns_none() {
        let registry = registry(&[("go to *", "navigate_to")]);
        assert!(match_command(&registry, "flibbertigibbet", "global").is_none());
    }
}
