//! Fuzzy matching for the list filter.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Case-insensitive fuzzy matcher.
///
/// Characters of the pattern must appear in order but need not be adjacent,
/// so `wbp` finds `web-prod`.
pub struct Matcher {
    inner: SkimMatcherV2,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    pub fn new() -> Self {
        Self {
            inner: SkimMatcherV2::default().ignore_case(),
        }
    }

    pub fn matches(&self, text: &str, pattern: &str) -> bool {
        self.inner.fuzzy_match(text, pattern).is_some()
    }

    /// True if any of `texts` matches. An empty pattern matches everything.
    pub fn matches_any<'a>(&self, texts: impl IntoIterator<Item = &'a str>, pattern: &str) -> bool {
        pattern.is_empty() || texts.into_iter().any(|text| self.matches(text, pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzy_match() {
        let matcher = Matcher::new();

        assert!(matcher.matches("web-prod-01", "wbp"));
        assert!(matcher.matches("rg-networking", "rgnet"));
        assert!(matcher.matches("westeurope", "westeurope"));

        assert!(matcher.matches("VM-Build-Agent", "build"));
        assert!(matcher.matches("vm-build-agent", "BUILD"));

        assert!(!matcher.matches("storage", "xyz"));
        // Order matters.
        assert!(!matcher.matches("abc", "cba"));
    }

    #[test]
    fn test_matches_any() {
        let matcher = Matcher::new();

        let texts = ["vm-1", "virtualMachines", "westeurope"];
        assert!(matcher.matches_any(texts, "virt"));
        assert!(matcher.matches_any(texts, "weu"));
        assert!(!matcher.matches_any(texts, "storage"));
        assert!(matcher.matches_any(texts, ""));
    }
}
