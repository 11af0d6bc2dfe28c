//! Hosts-file style domain set refreshed independently of the rule database.

use ahash::AHashSet;

use crate::request::domain_ancestors;
use crate::trie::normalize;

/// Addresses that hosts-file blocklists point blocked names at.
const SINKHOLE_ADDRESSES: &[&str] = &["0.0.0.0", "127.0.0.1", "::", "::1", "::0"];

/// Names that appear in hosts files but are never blocking targets.
const LOCAL_NAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "0.0.0.0",
];

/// Parse one hosts-file or plain-domain line into a normalized domain.
///
/// Accepts `0.0.0.0 domain`, `127.0.0.1 domain # comment` and bare
/// `domain`. Returns `None` for comments, local names and anything that is
/// not a dotted hostname.
pub fn parse_hosts_entry(line: &str) -> Option<String> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() || line.starts_with('!') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let name = if SINKHOLE_ADDRESSES.contains(&first) {
        parts.next()?
    } else if parts.next().is_none() {
        first
    } else {
        return None;
    };

    let domain = normalize(name);
    if LOCAL_NAMES.contains(&domain.as_str()) || !is_hostname(&domain) {
        return None;
    }
    Some(domain)
}

/// Dotted hostname made of letters, digits, `-` and `_`.
pub fn is_hostname(s: &str) -> bool {
    !s.is_empty()
        && s.contains('.')
        && s.split('.').all(|label| {
            !label.is_empty()
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

/// Supplementary set of blocked domains (and their subdomains).
#[derive(Debug, Default)]
pub struct RemoteDomainSet {
    domains: AHashSet<String>,
}

impl RemoteDomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from hosts-file text, skipping unusable lines.
    pub fn parse(text: &str) -> Self {
        let domains = text.lines().filter_map(parse_hosts_entry).collect();
        Self { domains }
    }

    /// True if the host or any parent domain is listed.
    pub fn contains(&self, host: &str) -> bool {
        if self.domains.is_empty() {
            return false;
        }
        domain_ancestors(host).any(|domain| self.domains.contains(domain))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
