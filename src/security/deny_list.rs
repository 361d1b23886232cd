//! Term-based command validator

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::gate::{CommandValidator, Verdict};

/// Rejects any command containing one of the configured terms
#[derive(Debug, Clone, Default)]
pub struct DenyListValidator {
    terms: BTreeSet<String>,
}

impl DenyListValidator {
    /// Build from a list of blocked terms (matched case-insensitively)
    #[must_use]
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { terms }
    }

    /// First blocked term found in `text`
    #[must_use]
    pub fn blocked_term(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.terms
            .iter()
            .find(|term| lower.contains(term.as_str()))
            .map(String::as_str)
    }
}

#[async_trait]
impl CommandValidator for DenyListValidator {
    async fn validate_command(&self, text: &str) -> anyhow::Result<Verdict> {
        Ok(self.blocked_term(text).map_or_else(Verdict::allow, |term| {
            tracing::debug!(term, "command contains blocked term");
            Verdict::deny("policy")
        }))
    }
}
