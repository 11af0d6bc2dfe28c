//! Error types for adgate.

use thiserror::Error;

/// Error type for adgate operations.
///
/// None of these ever escape [`ClassificationEngine::should_block`]; they are
/// reported by build, refresh and configuration entry points only.
///
/// [`ClassificationEngine::should_block`]: crate::ClassificationEngine::should_block
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (config or refresh ledger) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level download failure
    #[error("download error: {0}")]
    Download(String),

    /// Server answered with a non-success status
    #[error("HTTP error {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation needs a filter source the engine was built without
    #[error("no filter source attached")]
    NoSource,
}

/// Result type alias for adgate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a single filter-list line.
///
/// The compiler counts and discards these; a bad line never aborts a build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    /// Blank pattern after stripping anchors and options
    #[error("empty pattern")]
    EmptyPattern,

    /// Exception rule that is not a plain domain
    #[error("exception rule is not domain-only: {0}")]
    ComplexException(String),

    /// Regex rule that failed to compile
    #[error("invalid regex {pattern}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Option that turns the rule into something other than a block
    #[error("unsupported modifier: {0}")]
    UnsupportedModifier(String),

    /// Pattern too short or too generic to match safely
    #[error("pattern too generic: {0}")]
    TooGeneric(String),
}
