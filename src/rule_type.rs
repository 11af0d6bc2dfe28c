//! Filter rule kind definitions.

use std::fmt;

/// RuleKind represents how a compiled filter rule matches a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Blocked host; also covers every subdomain
    ExactDomain,
    /// Case-insensitive substring of the URL path and query
    PathSubstring,
    /// Pattern with `*`, `^` or anchors, translated to an anchored regex
    Wildcard,
    /// `/regex/` rule
    Regex,
    /// `@@` allow rule; always domain-only
    Exception,
}

impl RuleKind {
    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ExactDomain => "EXACT-DOMAIN",
            RuleKind::PathSubstring => "PATH-SUBSTRING",
            RuleKind::Wildcard => "WILDCARD",
            RuleKind::Regex => "REGEX",
            RuleKind::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
