//! Classification verdicts.

use std::fmt;

/// Decision represents what the interception layer should do with a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    /// Let the request through
    #[default]
    Allow,
    /// Cancel the request
    Block,
    /// Navigate to the contained URL instead of the blocked one
    Redirect(String),
}

impl Decision {
    /// Whether the request must not be loaded as issued.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Decision::Allow)
    }

    /// The redirect target, if any.
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Decision::Redirect(target) => Some(target),
            _ => None,
        }
    }

    /// Get the string representation of the verdict kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Block => "BLOCK",
            Decision::Redirect(_) => "REDIRECT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Redirect(target) => write!(f, "REDIRECT({})", target),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
