//! Compiled filter rules.

mod options;

pub use options::{DomainScope, ResourceTypes, RuleOptions, ThirdParty};

use regex::Regex;

use crate::RuleKind;

/// Matcher behind a Wildcard or Regex rule.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// Case-insensitive regex tested against the full URL
    Regex(Regex),
    /// Lowercase substring; used when a wildcard fails to compile
    Literal(String),
}

impl CompiledPattern {
    /// Test a URL. `url_lower` must be the lowercased form of `url`.
    #[inline]
    pub fn is_match(&self, url: &str, url_lower: &str) -> bool {
        match self {
            CompiledPattern::Regex(re) => re.is_match(url),
            CompiledPattern::Literal(needle) => url_lower.contains(needle.as_str()),
        }
    }

    /// Source text of the matcher.
    pub fn as_str(&self) -> &str {
        match self {
            CompiledPattern::Regex(re) => re.as_str(),
            CompiledPattern::Literal(needle) => needle,
        }
    }
}

/// Pattern payload of a rule; which variant is used follows from the kind.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Normalized host for ExactDomain and Exception rules
    Domain(String),
    /// Lowercase path fragment for PathSubstring rules
    Substring(String),
    /// Wildcard and Regex rules
    Compiled(CompiledPattern),
}

/// One compiled filter-list directive.
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub kind: RuleKind,
    pub pattern: Pattern,
    pub options: RuleOptions,
}

impl FilterRule {
    /// Blocked host (and subdomains).
    pub fn exact_domain(domain: impl Into<String>, options: RuleOptions) -> Self {
        Self {
            kind: RuleKind::ExactDomain,
            pattern: Pattern::Domain(domain.into()),
            options,
        }
    }

    /// Domain-only allow entry. Exceptions never carry options.
    pub fn exception(domain: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Exception,
            pattern: Pattern::Domain(domain.into()),
            options: RuleOptions::default(),
        }
    }

    /// Path fragment.
    pub fn path_substring(fragment: impl Into<String>, options: RuleOptions) -> Self {
        Self {
            kind: RuleKind::PathSubstring,
            pattern: Pattern::Substring(fragment.into()),
            options,
        }
    }

    /// Translated wildcard pattern.
    pub fn wildcard(pattern: CompiledPattern, options: RuleOptions) -> Self {
        Self {
            kind: RuleKind::Wildcard,
            pattern: Pattern::Compiled(pattern),
            options,
        }
    }

    /// `/regex/` rule.
    pub fn regex(regex: Regex, options: RuleOptions) -> Self {
        Self {
            kind: RuleKind::Regex,
            pattern: Pattern::Compiled(CompiledPattern::Regex(regex)),
            options,
        }
    }

    /// Domain of an ExactDomain or Exception rule.
    pub fn domain(&self) -> Option<&str> {
        match &self.pattern {
            Pattern::Domain(domain) => Some(domain),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiled_pattern_match() {
        let re = regex::RegexBuilder::new(r"banner\d+\.gif")
            .case_insensitive(true)
            .build()
            .unwrap();
        let pattern = CompiledPattern::Regex(re);
        let url = "https://x.example/BANNER12.gif";
        assert!(pattern.is_match(url, &url.to_lowercase()));

        let literal = CompiledPattern::Literal("/ads/".to_string());
        let url = "https://x.example/ADS/a.png";
        assert!(literal.is_match(url, &url.to_lowercase()));
        assert_eq!(literal.as_str(), "/ads/");
    }

    #[test]
    fn test_constructors() {
        let rule = FilterRule::exception("cdn.example.com");
        assert_eq!(rule.kind, RuleKind::Exception);
        assert_eq!(rule.domain(), Some("cdn.example.com"));
        assert!(rule.options.is_unconditional());

        let rule = FilterRule::path_substring("/ads/", RuleOptions::default());
        assert_eq!(rule.kind, RuleKind::PathSubstring);
        assert_eq!(rule.domain(), None);
    }
}
