//! Filter-list compiler: text in, [`RuleDatabase`] out.

mod parser;
mod wildcard;

pub use parser::{parse_line, ParsedLine};
pub use wildcard::{compile_wildcard, wildcard_to_regex};

use crate::config::EngineConfig;
use crate::database::{ListStatus, RuleDatabase, RuleDatabaseBuilder};
use crate::source::{FilterText, ListOrigin};

/// Compiles filter-list text into a fresh [`RuleDatabase`].
///
/// Compilation never fails: lines that do not parse are counted and skipped,
/// and the same input always yields the same database.
///
/// # Example
/// ```
/// use adgate::{EngineConfig, RuleCompiler};
///
/// let compiler = RuleCompiler::new(&EngineConfig::default());
/// let db = compiler.compile_text("||doubleclick.net^\n@@||cdn.example.com^\n");
/// assert_eq!(db.counts().exact_domains, 1);
/// assert_eq!(db.counts().exception_domains, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    max_pattern_rules: usize,
    bloom_fp_rate: f64,
    extra_critical_domains: Vec<String>,
}

impl RuleCompiler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_pattern_rules: config.max_pattern_rules,
            bloom_fp_rate: config.bloom_false_positive_rate,
            extra_critical_domains: config.extra_critical_domains.clone(),
        }
    }

    /// Compile a single anonymous list.
    pub fn compile_text(&self, text: &str) -> RuleDatabase {
        let mut builder = self.builder();
        let rules = Self::feed(&mut builder, text);
        builder.record_list(ListStatus {
            name: "inline".to_string(),
            origin: ListOrigin::Inline,
            rules,
        });
        self.finish(builder)
    }

    /// Compile several named lists into one database.
    pub fn compile_lists(&self, lists: &[FilterText]) -> RuleDatabase {
        let mut builder = self.builder();
        for list in lists {
            let rules = match &list.text {
                Some(text) => Self::feed(&mut builder, text),
                None => 0,
            };
            builder.record_list(ListStatus {
                name: list.name.clone(),
                origin: list.origin,
                rules,
            });
        }
        self.finish(builder)
    }

    fn builder(&self) -> RuleDatabaseBuilder {
        let mut builder = RuleDatabaseBuilder::new(self.max_pattern_rules, self.bloom_fp_rate);
        for domain in &self.extra_critical_domains {
            builder.add_critical_domain(domain);
        }
        builder
    }

    fn feed(builder: &mut RuleDatabaseBuilder, text: &str) -> usize {
        let mut rules = 0;
        for line in text.lines() {
            if builder.add_line(parse_line(line)) {
                rules += 1;
            }
        }
        rules
    }

    fn finish(&self, builder: RuleDatabaseBuilder) -> RuleDatabase {
        let db = builder.build();
        let counts = db.counts();
        log::info!(
            "Compiled rule database: {} domains, {} exceptions, {} paths, {} wildcard, {} regex ({} skipped, {} dropped)",
            counts.exact_domains,
            counts.exception_domains,
            counts.path_rules,
            counts.wildcard_rules,
            counts.regex_rules,
            counts.skipped_lines,
            counts.dropped_rules
        );
        db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ClassificationRequest, RequestContext};

    const SAMPLE: &str = r#"! Sample list
||doubleclick.net^
@@||cdn.example.com^
/banner\d+\.gif/
||example.com/*/ads/*$third-party,domain=site.com
/ads/
example.com##.sidebar-ad
"#;

    #[test]
    fn test_compile_sample() {
        let compiler = RuleCompiler::new(&EngineConfig::default());
        let db = compiler.compile_text(SAMPLE);
        let counts = db.counts();
        assert_eq!(counts.exact_domains, 1);
        assert_eq!(counts.exception_domains, 1);
        assert_eq!(counts.regex_rules, 1);
        assert_eq!(counts.wildcard_rules, 1);
        assert_eq!(counts.path_rules, 1);
        assert_eq!(counts.cosmetic_lines, 1);
        assert_eq!(db.lists()[0].rules, 5);
    }

    #[test]
    fn test_extra_critical_domains() {
        let config = EngineConfig::default().with_critical_domain("bank.example");
        let db = RuleCompiler::new(&config).compile_text("");
        assert!(db.is_critical("online.bank.example"));
    }

    #[test]
    fn test_pattern_cap_applies() {
        let config = EngineConfig::default().with_max_pattern_rules(1);
        let db = RuleCompiler::new(&config).compile_text("/a*b/c/\n/x*y/z/\n/foo(bar)?/\n");
        let counts = db.counts();
        assert_eq!(counts.wildcard_rules + counts.regex_rules, 1);
        assert_eq!(counts.dropped_rules, 2);
    }

    #[test]
    fn test_compile_lists_records_origins() {
        let compiler = RuleCompiler::new(&EngineConfig::default());
        let lists = vec![
            FilterText {
                name: "easylist".into(),
                text: Some("||ads.example^\n".into()),
                origin: ListOrigin::Remote,
            },
            FilterText {
                name: "privacy".into(),
                text: None,
                origin: ListOrigin::Missing,
            },
        ];
        let db = compiler.compile_lists(&lists);
        assert_eq!(db.lists().len(), 2);
        assert_eq!(db.lists()[0].rules, 1);
        assert_eq!(db.lists()[1].origin, ListOrigin::Missing);
        assert!(db.is_domain_blocked("x.ads.example"));
    }

    #[test]
    fn test_wildcard_options_evaluated() {
        let db = RuleCompiler::new(&EngineConfig::default()).compile_text(SAMPLE);
        let ctx = |url: &'static str, page: &'static str| {
            RequestContext::parse(&ClassificationRequest::new(url).with_page(page)).unwrap()
        };
        assert!(db.matches_pattern(&ctx("https://example.com/x/ads/1.js", "https://site.com/")));
        assert!(!db.matches_pattern(&ctx("https://example.com/x/ads/1.js", "https://other.org/")));
    }
}
