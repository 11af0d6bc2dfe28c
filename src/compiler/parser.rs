//! Line classifier for Adblock-Plus-style filter lists.

use crate::error::RuleParseError;
use crate::remote_domains::{is_hostname, parse_hosts_entry};
use crate::rule::{FilterRule, RuleOptions};
use crate::trie::normalize;

use super::wildcard::{compile_regex, compile_wildcard};

/// Shortest accepted path fragment.
const MIN_SUBSTRING_LEN: usize = 3;

/// Characters that mark a `/.../` rule as a regex rather than a path.
const REGEX_MARKERS: &[char] = &['\\', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|'];

/// Outcome of parsing one line.
#[derive(Debug)]
pub enum ParsedLine {
    Blank,
    Comment,
    /// Element-hiding rule; irrelevant for network blocking
    Cosmetic,
    Rule(FilterRule),
    Invalid(RuleParseError),
}

/// Classify one filter-list line.
pub fn parse_line(raw: &str) -> ParsedLine {
    let line = raw.trim();
    if line.is_empty() {
        return ParsedLine::Blank;
    }
    if line.starts_with('!') || (line.starts_with('[') && line.ends_with(']')) {
        return ParsedLine::Comment;
    }
    if is_cosmetic(line) {
        return ParsedLine::Cosmetic;
    }
    if line.starts_with('#') {
        return ParsedLine::Comment;
    }

    match parse_rule(line) {
        Ok(rule) => ParsedLine::Rule(rule),
        Err(e) => ParsedLine::Invalid(e),
    }
}

fn is_cosmetic(line: &str) -> bool {
    line.contains("##")
        || line.contains("#@#")
        || line.contains("#?#")
        || line.contains("#$#")
        || line.contains("#%#")
}

fn parse_rule(line: &str) -> Result<FilterRule, RuleParseError> {
    if let Some(rest) = line.strip_prefix("@@") {
        return parse_exception(rest);
    }

    if let Some(domain) = parse_hosts_line(line) {
        return Ok(FilterRule::exact_domain(domain, RuleOptions::default()));
    }

    let (pattern, options_text) = split_options(line);
    let options = match options_text {
        Some(text) => RuleOptions::parse(text)?,
        None => RuleOptions::default(),
    };
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(RuleParseError::EmptyPattern);
    }

    if let Some(body) = regex_body(pattern) {
        return compile_regex(body)
            .map(|re| FilterRule::regex(re, options))
            .map_err(|e| RuleParseError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            });
    }

    if pattern.contains('*') {
        return wildcard_rule(pattern, options);
    }

    if let Some(rest) = pattern.strip_prefix("||") {
        if let Some(domain) = anchored_domain(rest) {
            return Ok(FilterRule::exact_domain(domain, options));
        }
        return wildcard_rule(pattern, options);
    }

    if pattern.starts_with('|') || pattern.contains('^') {
        return wildcard_rule(pattern, options);
    }

    let domain = normalize(pattern);
    if !pattern.contains('/') && is_hostname(&domain) {
        return Ok(FilterRule::exact_domain(domain, options));
    }

    let fragment = pattern.to_ascii_lowercase();
    if fragment.len() < MIN_SUBSTRING_LEN {
        return Err(RuleParseError::TooGeneric(pattern.to_string()));
    }
    Ok(FilterRule::path_substring(fragment, options))
}

/// `@@` rules are allow entries for a whole domain and nothing else.
fn parse_exception(rest: &str) -> Result<FilterRule, RuleParseError> {
    let (pattern, options_text) = split_options(rest);
    if let Some(text) = options_text {
        let options = RuleOptions::parse(text)?;
        if !options.is_unconditional() {
            return Err(RuleParseError::ComplexException(rest.to_string()));
        }
    }

    let pattern = pattern.trim();
    let host = pattern.strip_prefix("||").unwrap_or(pattern);
    match anchored_domain(host) {
        Some(domain) => Ok(FilterRule::exception(domain)),
        None if pattern.is_empty() => Err(RuleParseError::EmptyPattern),
        None => Err(RuleParseError::ComplexException(rest.to_string())),
    }
}

/// Hosts-file entries (`0.0.0.0 domain`). Bare domains are handled later so
/// that their options are honored.
fn parse_hosts_line(line: &str) -> Option<String> {
    if !line.contains(char::is_whitespace) {
        return None;
    }
    parse_hosts_entry(line)
}

/// Domain part of `domain^`, `domain^|` or `domain`, if that is all there is.
fn anchored_domain(rest: &str) -> Option<String> {
    let host = rest
        .strip_suffix("^|")
        .or_else(|| rest.strip_suffix('^'))
        .or_else(|| rest.strip_suffix('|'))
        .unwrap_or(rest);
    let domain = normalize(host);
    is_hostname(&domain).then_some(domain)
}

fn wildcard_rule(pattern: &str, options: RuleOptions) -> Result<FilterRule, RuleParseError> {
    compile_wildcard(pattern)
        .map(|compiled| FilterRule::wildcard(compiled, options))
        .ok_or_else(|| RuleParseError::TooGeneric(pattern.to_string()))
}

/// Body of a `/.../` rule that uses regex syntax.
fn regex_body(pattern: &str) -> Option<&str> {
    let body = pattern.strip_prefix('/')?.strip_suffix('/')?;
    (!body.is_empty() && body.contains(REGEX_MARKERS)).then_some(body)
}

/// Split at the last `$` that starts an options segment.
///
/// A `$` followed by a `/` belongs to a regex (`/foo$/`).
fn split_options(line: &str) -> (&str, Option<&str>) {
    match line.rfind('$') {
        Some(pos) if !line[pos + 1..].contains('/') => (&line[..pos], Some(&line[pos + 1..])),
        _ => (line, None),
    }
}
