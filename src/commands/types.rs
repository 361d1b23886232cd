//! Command pattern data model

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Functional grouping of a command, used for per-category metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Navigation,
    #[default]
    Interaction,
    System,
    Accessibility,
    Personalization,
    Query,
    Control,
}

impl Category {
    /// Lowercase name, also used as the metrics bucket key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Interaction => "interaction",
            Self::System => "system",
            Self::Accessibility => "accessibility",
            Self::Personalization => "personalization",
            Self::Query => "query",
            Self::Control => "control",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal importance of a command (`low < medium < high < critical`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Importance {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated handler identifier
///
/// Strings are only accepted at the registration boundary; past that point
/// handlers and patterns refer to each other through this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HandlerName(Arc<str>);

impl HandlerName {
    /// Parse a handler name, rejecting empty or blank input
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(Arc::from(name)))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registration-time settings for a pattern
///
/// Anything left unset falls back to the registry defaults
/// (`interaction`, `medium`, no confirmation, any context).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternConfig {
    /// Name of the handler that executes matches of this pattern
    pub handler: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub importance: Option<Importance>,
    #[serde(default)]
    pub requires_confirmation: Option<bool>,
    /// Contexts in which the pattern is active (empty = all)
    #[serde(default)]
    pub contexts: Vec<String>,
}

impl PatternConfig {
    /// Create a config routed to the given handler
    #[must_use]
    pub fn new(handler: &str) -> Self {
        Self {
            handler: handler.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub const fn importance(mut self, importance: Importance) -> Self {
        self.importance = Some(importance);
        self
    }

    #[must_use]
    pub const fn requires_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = Some(required);
        self
    }

    /// Restrict the pattern to the given context
    #[must_use]
    pub fn context(mut self, context: &str) -> Self {
        self.contexts.push(context.to_string());
        self
    }
}

/// A registered wildcard command pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandPattern {
    /// Pattern text with `*` wildcard slots
    pub pattern: String,
    pub handler: HandlerName,
    pub category: Category,
    pub importance: Importance,
    pub requires_confirmation: bool,
    /// Active contexts (empty = active everywhere)
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub contexts: BTreeSet<String>,
}

impl CommandPattern {
    /// Whether this pattern may match while `context` is active
    #[must_use]
    pub fn applies_to(&self, context: &str) -> bool {
        self.contexts.is_empty() || self.contexts.contains(context)
    }
}

/// A successful match of a command against a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub pattern: Arc<CommandPattern>,
    /// Wildcard captures, left to right
    pub params: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_name_serializes_as_plain_string() {
        let name = HandlerName::parse(" navigate_to ").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"navigate_to\"");
    }

    #[test]
    fn importance_is_ordered() {
        assert!(Importance::Low < Importance::Medium);
        assert!(Importance::Medium < Importance::High);
        assert!(Importance::High < Importance::Critical);
        assert!(Importance::Critical.is_critical());
        assert!(!Importance::High.is_critical());
    }

    #[test]
    fn handler_name_rejects_blank() {
        assert!(HandlerName::parse("").is_none());
        assert!(HandlerName::parse("   ").is_none());
        assert_eq!(HandlerName::parse(" navigate ").unwrap().as_str(), "navigate");
    }

    #[test]
    fn pattern_config_deserializes_lowercase_enums() {
        let config: PatternConfig = toml::from_str(
            r#"
            handler = "open_menu"
            category = "navigation"
            importance = "high"
            contexts = ["menu"]
            "#,
        )
        .unwrap();

        assert_eq!(config.handler, "open_menu");
        assert_eq!(config.category, Some(Category::Navigation));
        assert_eq!(config.importance, Some(Importance::High));
        assert_eq!(config.requires_confirmation, None);
        assert_eq!(config.contexts, vec!["menu"]);
    }

    #[test]
    fn empty_contexts_apply_everywhere() {
        let pattern = CommandPattern {
            pattern: "help".to_string(),
            handler: HandlerName::parse("help").unwrap(),
            category: Category::Query,
            importance: Importance::Low,
            requires_confirmation: false,
            contexts: BTreeSet::new(),
        };
        assert!(pattern.applies_to("global"));
        assert!(pattern.applies_to("editor"));
    }
}
