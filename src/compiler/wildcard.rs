//! Translation of Adblock-style wildcard patterns to anchored regexes.

use regex::RegexBuilder;

use crate::rule::CompiledPattern;

/// `||` prefix: scheme plus any number of subdomain labels.
const DOMAIN_ANCHOR: &str = r"^https?://([^/]+\.)?";

/// `^` separator: a URL delimiter or the end of the URL.
const SEPARATOR: &str = r"(?:[/?&=]|$)";

/// Upper bound on the compiled size of a single rule.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Shortest literal accepted when a wildcard has to degrade.
const MIN_LITERAL_LEN: usize = 3;

/// Translate a wildcard pattern into regex source.
///
/// Every regex metacharacter is escaped first; then `||` becomes the domain
/// anchor, a leading or trailing `|` an exact anchor, `^` the separator class
/// and `*` `.*`.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut body = pattern;

    if let Some(rest) = body.strip_prefix("||") {
        out.push_str(DOMAIN_ANCHOR);
        body = rest;
    } else if let Some(rest) = body.strip_prefix('|') {
        out.push('^');
        body = rest;
    }

    let (body, right_anchor) = match body.strip_suffix('|') {
        Some(rest) => (rest, true),
        None => (body, false),
    };

    let mut buf = [0u8; 4];
    for ch in body.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '^' => out.push_str(SEPARATOR),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }

    if right_anchor {
        out.push('$');
    }
    out
}

/// Longest literal run of a wildcard pattern, lowercased.
fn longest_literal(pattern: &str) -> Option<String> {
    pattern
        .trim_start_matches('|')
        .trim_end_matches('|')
        .split(['*', '^'])
        .max_by_key(|part| part.len())
        .filter(|part| part.len() >= MIN_LITERAL_LEN)
        .map(str::to_ascii_lowercase)
}

/// Compile a wildcard pattern case-insensitively.
///
/// A pattern that fails to compile degrades to a substring matcher on its
/// longest literal run; `None` means not even that was usable.
pub fn compile_wildcard(pattern: &str) -> Option<CompiledPattern> {
    let source = wildcard_to_regex(pattern);
    match RegexBuilder::new(&source)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
    {
        Ok(re) => Some(CompiledPattern::Regex(re)),
        Err(e) => {
            log::debug!("Wildcard {} degraded to literal: {}", pattern, e);
            longest_literal(pattern).map(CompiledPattern::Literal)
        }
    }
}

/// Compile a `/regex/` body case-insensitively.
pub fn compile_regex(body: &str) -> Result<regex::Regex, regex::Error> {
    RegexBuilder::new(body)
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
}
