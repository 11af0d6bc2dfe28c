//! Pattern rules and the small lookup tables consulted around them.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use ahash::AHashMap;

use crate::builtin::{CNAME_ALIASES, CRITICAL_DOMAINS, FIRST_PARTY_AD_PATHS};
use crate::request::{domain_ancestors, registrable_domain, RequestContext};
use crate::rule::{CompiledPattern, RuleOptions};
use crate::trie::{normalize, DomainTrie};

/// A Wildcard or Regex rule with its options.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: CompiledPattern,
    pub options: RuleOptions,
}

impl PatternRule {
    #[inline]
    fn matches(&self, ctx: &RequestContext<'_>) -> bool {
        self.pattern.is_match(ctx.url, &ctx.url_lower) && self.options.matches(ctx)
    }
}

/// Path-substring rules behind one Aho-Corasick automaton.
struct PathMatcher {
    automaton: Option<AhoCorasick>,
    options: Vec<RuleOptions>,
}

impl PathMatcher {
    fn build(rules: Vec<(String, RuleOptions)>) -> Self {
        if rules.is_empty() {
            return Self {
                automaton: None,
                options: Vec::new(),
            };
        }
        let (fragments, options): (Vec<String>, Vec<RuleOptions>) = rules.into_iter().unzip();
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&fragments)
            .map_err(|e| log::warn!("Path rule automaton failed to build: {}", e))
            .ok();
        Self { automaton, options }
    }

    fn is_match(&self, ctx: &RequestContext<'_>) -> bool {
        let Some(automaton) = &self.automaton else {
            return false;
        };
        automaton
            .find_overlapping_iter(&ctx.path_lower)
            .any(|m| self.options[m.pattern().as_usize()].matches(ctx))
    }

    fn len(&self) -> usize {
        self.options.len()
    }
}

/// Compiled pattern rules plus the first-party, CNAME and critical tables.
pub struct PatternStore {
    wildcard: Vec<PatternRule>,
    regex: Vec<PatternRule>,
    paths: PathMatcher,
    /// Host rules that only apply under their options
    scoped_domains: AHashMap<String, Vec<RuleOptions>>,
    first_party_paths: AHashMap<String, Vec<String>>,
    cname_aliases: AHashMap<String, Vec<String>>,
    critical: DomainTrie,
    dropped: usize,
}

impl PatternStore {
    /// Wildcard rules first, then regex rules, stopping at the first hit.
    pub fn matches_pattern(&self, ctx: &RequestContext<'_>) -> bool {
        self.wildcard.iter().any(|rule| rule.matches(ctx))
            || self.regex.iter().any(|rule| rule.matches(ctx))
    }

    pub fn matches_path(&self, ctx: &RequestContext<'_>) -> bool {
        self.paths.is_match(ctx)
    }

    /// Scoped host rules for the request host or any of its parents.
    pub fn matches_scoped_domain(&self, ctx: &RequestContext<'_>) -> bool {
        if self.scoped_domains.is_empty() {
            return false;
        }
        domain_ancestors(&ctx.host).any(|domain| {
            self.scoped_domains
                .get(domain)
                .is_some_and(|all| all.iter().any(|opts| opts.matches(ctx)))
        })
    }

    /// Known ad paths for the request host (or a parent of it).
    pub fn matches_first_party_path(&self, ctx: &RequestContext<'_>) -> bool {
        domain_ancestors(&ctx.host).any(|domain| {
            self.first_party_paths.get(domain).is_some_and(|paths| {
                paths.iter().any(|p| ctx.path_lower.contains(p.as_str()))
            })
        })
    }

    /// Tracker domains a host's first label is known to alias.
    ///
    /// Only subdomain labels count; a registrable domain such as `ea.com`
    /// is never treated as an alias.
    pub fn cname_targets(&self, host: &str) -> Option<&[String]> {
        if registrable_domain(host) == host {
            return None;
        }
        let (label, _) = host.split_once('.')?;
        self.cname_aliases.get(label).map(Vec::as_slice)
    }

    pub fn is_critical(&self, host: &str) -> bool {
        self.critical.is_blocked_normalized(host)
    }

    pub fn wildcard_count(&self) -> usize {
        self.wildcard.len()
    }

    pub fn regex_count(&self) -> usize {
        self.regex.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn scoped_domain_count(&self) -> usize {
        self.scoped_domains.values().map(Vec::len).sum()
    }

    /// Pattern rules discarded because the cap was reached.
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }
}

/// Builder for [`PatternStore`] enforcing the wildcard+regex cap.
pub struct PatternStoreBuilder {
    max_pattern_rules: usize,
    wildcard: Vec<PatternRule>,
    regex: Vec<PatternRule>,
    paths: Vec<(String, RuleOptions)>,
    scoped_domains: AHashMap<String, Vec<RuleOptions>>,
    first_party_paths: AHashMap<String, Vec<String>>,
    cname_aliases: AHashMap<String, Vec<String>>,
    critical: DomainTrie,
    dropped: usize,
}

impl PatternStoreBuilder {
    /// Start from the built-in tables.
    pub fn new(max_pattern_rules: usize) -> Self {
        let mut builder = Self {
            max_pattern_rules,
            wildcard: Vec::new(),
            regex: Vec::new(),
            paths: Vec::new(),
            scoped_domains: AHashMap::new(),
            first_party_paths: AHashMap::new(),
            cname_aliases: AHashMap::new(),
            critical: DomainTrie::new(),
            dropped: 0,
        };
        for domain in CRITICAL_DOMAINS {
            builder.critical.add(domain);
        }
        for (domain, paths) in FIRST_PARTY_AD_PATHS {
            for path in *paths {
                builder.add_first_party_path(domain, path);
            }
        }
        for (label, targets) in CNAME_ALIASES {
            for target in *targets {
                builder.add_cname_alias(label, target);
            }
        }
        builder
    }

    fn has_pattern_room(&mut self) -> bool {
        if self.wildcard.len() + self.regex.len() < self.max_pattern_rules {
            return true;
        }
        self.dropped += 1;
        false
    }

    pub fn add_wildcard(&mut self, pattern: CompiledPattern, options: RuleOptions) {
        if self.has_pattern_room() {
            self.wildcard.push(PatternRule { pattern, options });
        }
    }

    pub fn add_regex(&mut self, pattern: CompiledPattern, options: RuleOptions) {
        if self.has_pattern_room() {
            self.regex.push(PatternRule { pattern, options });
        }
    }

    pub fn add_path(&mut self, fragment: String, options: RuleOptions) {
        self.paths.push((fragment, options));
    }

    pub fn add_scoped_domain(&mut self, domain: String, options: RuleOptions) {
        self.scoped_domains.entry(domain).or_default().push(options);
    }

    pub fn add_critical_domain(&mut self, domain: &str) {
        self.critical.add(domain);
    }

    pub fn add_first_party_path(&mut self, domain: &str, path: &str) {
        let domain = normalize(domain);
        if domain.is_empty() || path.is_empty() {
            return;
        }
        let paths = self.first_party_paths.entry(domain).or_default();
        let path = path.to_ascii_lowercase();
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    /// Register a CNAME alias. Repeated labels accumulate targets.
    pub fn add_cname_alias(&mut self, label: &str, tracker_domain: &str) {
        let label = label.trim().to_ascii_lowercase();
        let target = normalize(tracker_domain);
        if label.is_empty() || label.contains('.') || target.is_empty() {
            return;
        }
        let targets = self.cname_aliases.entry(label).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    pub fn build(self) -> PatternStore {
        if self.dropped > 0 {
            log::warn!(
                "Pattern rule cap of {} reached; dropped {} rules",
                self.max_pattern_rules,
                self.dropped
            );
        }
        PatternStore {
            wildcard: self.wildcard,
            regex: self.regex,
            paths: PathMatcher::build(self.paths),
            scoped_domains: self.scoped_domains,
            first_party_paths: self.first_party_paths,
            cname_aliases: self.cname_aliases,
            critical: self.critical,
            dropped: self.dropped,
        }
    }
}
