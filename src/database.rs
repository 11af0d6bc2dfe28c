//! Query-ready rule database.

use serde::Serialize;

use crate::bloom::BloomFilter;
use crate::compiler::ParsedLine;
use crate::pattern_store::{PatternStore, PatternStoreBuilder};
use crate::request::{domain_ancestors, RequestContext};
use crate::rule::{FilterRule, Pattern};
use crate::source::ListOrigin;
use crate::trie::DomainTrie;
use crate::RuleKind;

/// Per-kind rule counts of a database build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleCounts {
    pub exact_domains: usize,
    pub scoped_domains: usize,
    pub exception_domains: usize,
    pub path_rules: usize,
    pub wildcard_rules: usize,
    pub regex_rules: usize,
    /// Pattern rules discarded by the cap
    pub dropped_rules: usize,
    /// Lines that failed to parse
    pub skipped_lines: usize,
    pub cosmetic_lines: usize,
}

impl RuleCounts {
    /// Rules that can match a request.
    pub fn total(&self) -> usize {
        self.exact_domains
            + self.scoped_domains
            + self.exception_domains
            + self.path_rules
            + self.wildcard_rules
            + self.regex_rules
    }
}

/// Where one filter list's text came from in a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListStatus {
    pub name: String,
    pub origin: ListOrigin,
    /// Lines that produced a rule
    pub rules: usize,
}

/// The compiled, immutable aggregate consulted on every request.
///
/// Built once by [`RuleDatabaseBuilder`] and then shared read-only; a new
/// filter text produces a new database rather than a mutation.
pub struct RuleDatabase {
    blocked: DomainTrie,
    bloom: BloomFilter,
    exceptions: DomainTrie,
    patterns: PatternStore,
    counts: RuleCounts,
    lists: Vec<ListStatus>,
}

/// Lookups take hosts as [`RequestContext`] produces them: lowercase, no
/// trailing dot.
impl RuleDatabase {
    pub fn is_critical(&self, host: &str) -> bool {
        self.patterns.is_critical(host)
    }

    /// `@@` entry for the host or a parent.
    pub fn is_exception(&self, host: &str) -> bool {
        !self.exceptions.is_empty() && self.exceptions.is_blocked_normalized(host)
    }

    /// Unconditional host rule for the host or a parent.
    ///
    /// The trie is only walked when the Bloom filter admits at least one of
    /// the host's suffixes.
    pub fn is_domain_blocked(&self, host: &str) -> bool {
        if !domain_ancestors(host).any(|d| self.bloom.might_contain(d)) {
            return false;
        }
        self.blocked.is_blocked_normalized(host)
    }

    pub fn matches_scoped_domain(&self, ctx: &RequestContext<'_>) -> bool {
        self.patterns.matches_scoped_domain(ctx)
    }

    pub fn matches_path(&self, ctx: &RequestContext<'_>) -> bool {
        self.patterns.matches_path(ctx)
    }

    pub fn matches_first_party_path(&self, ctx: &RequestContext<'_>) -> bool {
        self.patterns.matches_first_party_path(ctx)
    }

    pub fn matches_pattern(&self, ctx: &RequestContext<'_>) -> bool {
        self.patterns.matches_pattern(ctx)
    }

    pub fn cname_targets(&self, host: &str) -> Option<&[String]> {
        self.patterns.cname_targets(host)
    }

    pub fn counts(&self) -> RuleCounts {
        self.counts
    }

    pub fn lists(&self) -> &[ListStatus] {
        &self.lists
    }

    pub fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    pub fn trie(&self) -> &DomainTrie {
        &self.blocked
    }
}

/// Accumulates rules, then freezes them into a [`RuleDatabase`].
pub struct RuleDatabaseBuilder {
    exact: Vec<String>,
    exceptions: DomainTrie,
    patterns: PatternStoreBuilder,
    bloom_fp_rate: f64,
    counts: RuleCounts,
    lists: Vec<ListStatus>,
}

impl RuleDatabaseBuilder {
    pub fn new(max_pattern_rules: usize, bloom_fp_rate: f64) -> Self {
        Self {
            exact: Vec::new(),
            exceptions: DomainTrie::new(),
            patterns: PatternStoreBuilder::new(max_pattern_rules),
            bloom_fp_rate,
            counts: RuleCounts::default(),
            lists: Vec::new(),
        }
    }

    /// Route one parsed line. Returns whether it produced a rule.
    pub fn add_line(&mut self, line: ParsedLine) -> bool {
        match line {
            ParsedLine::Rule(rule) => {
                self.add_rule(rule);
                true
            }
            ParsedLine::Cosmetic => {
                self.counts.cosmetic_lines += 1;
                false
            }
            ParsedLine::Invalid(e) => {
                log::debug!("Skipping filter line: {}", e);
                self.counts.skipped_lines += 1;
                false
            }
            ParsedLine::Blank | ParsedLine::Comment => false,
        }
    }

    /// Route a rule into the structure that serves its kind.
    pub fn add_rule(&mut self, rule: FilterRule) {
        let FilterRule {
            kind,
            pattern,
            options,
        } = rule;
        match (kind, pattern) {
            (RuleKind::ExactDomain, Pattern::Domain(domain)) => {
                if options.is_unconditional() {
                    self.exact.push(domain);
                } else {
                    self.patterns.add_scoped_domain(domain, options);
                }
            }
            (RuleKind::Exception, Pattern::Domain(domain)) => self.exceptions.add(&domain),
            (RuleKind::PathSubstring, Pattern::Substring(fragment)) => {
                self.patterns.add_path(fragment, options)
            }
            (RuleKind::Wildcard, Pattern::Compiled(compiled)) => {
                self.patterns.add_wildcard(compiled, options)
            }
            (RuleKind::Regex, Pattern::Compiled(compiled)) => {
                self.patterns.add_regex(compiled, options)
            }
            (kind, _) => {
                log::debug!("Rule of kind {} with mismatched pattern ignored", kind);
                self.counts.skipped_lines += 1;
            }
        }
    }

    pub fn add_critical_domain(&mut self, domain: &str) {
        self.patterns.add_critical_domain(domain);
    }

    pub fn add_cname_alias(&mut self, label: &str, tracker_domain: &str) {
        self.patterns.add_cname_alias(label, tracker_domain);
    }

    pub fn add_first_party_path(&mut self, domain: &str, path: &str) {
        self.patterns.add_first_party_path(domain, path);
    }

    pub fn record_list(&mut self, status: ListStatus) {
        self.lists.push(status);
    }

    pub fn build(mut self) -> RuleDatabase {
        self.exact.sort_unstable();
        self.exact.dedup();

        let bloom = BloomFilter::new(self.exact.len(), self.bloom_fp_rate);
        let mut blocked = DomainTrie::new();
        for domain in &self.exact {
            blocked.add(domain);
            bloom.add(domain);
        }

        let patterns = self.patterns.build();
        let counts = RuleCounts {
            exact_domains: blocked.len(),
            exception_domains: self.exceptions.len(),
            scoped_domains: patterns.scoped_domain_count(),
            path_rules: patterns.path_count(),
            wildcard_rules: patterns.wildcard_count(),
            regex_rules: patterns.regex_count(),
            dropped_rules: patterns.dropped_count(),
            ..self.counts
        };

        RuleDatabase {
            blocked,
            bloom,
            exceptions: self.exceptions,
            patterns,
            counts,
            lists: self.lists,
        }
    }
}
