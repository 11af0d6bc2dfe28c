//! `$options` segment of a filter rule.

use bitflags::bitflags;

use crate::error::RuleParseError;
use crate::request::{is_same_or_subdomain, RequestContext};

bitflags! {
    /// Resource types a rule applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypes: u16 {
        const DOCUMENT = 1 << 0;
        const SUBDOCUMENT = 1 << 1;
        const SCRIPT = 1 << 2;
        const STYLESHEET = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const MEDIA = 1 << 6;
        const OBJECT = 1 << 7;
        const XMLHTTPREQUEST = 1 << 8;
        const PING = 1 << 9;
        const WEBSOCKET = 1 << 10;
        const OTHER = 1 << 11;
    }
}

impl ResourceTypes {
    /// Map a filter-list option name to its flag.
    pub fn from_option_name(name: &str) -> Option<Self> {
        let flag = match name {
            "document" | "doc" => Self::DOCUMENT,
            "subdocument" | "frame" => Self::SUBDOCUMENT,
            "script" => Self::SCRIPT,
            "stylesheet" | "css" => Self::STYLESHEET,
            "image" => Self::IMAGE,
            "font" => Self::FONT,
            "media" => Self::MEDIA,
            "object" | "object-subrequest" => Self::OBJECT,
            "xmlhttprequest" | "xhr" => Self::XMLHTTPREQUEST,
            "ping" | "beacon" => Self::PING,
            "websocket" => Self::WEBSOCKET,
            "other" => Self::OTHER,
            _ => return None,
        };
        Some(flag)
    }
}

/// Party restriction of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThirdParty {
    #[default]
    Any,
    OnlyThirdParty,
    OnlyFirstParty,
}

/// `domain=` restriction: page hosts the rule is limited to or excluded from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainScope {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl DomainScope {
    fn parse(value: &str) -> Self {
        let mut scope = DomainScope::default();
        for entry in value.split('|') {
            let entry = entry.trim();
            if let Some(excluded) = entry.strip_prefix('~') {
                let domain = crate::trie::normalize(excluded);
                if !domain.is_empty() {
                    scope.exclude.push(domain);
                }
            } else {
                let domain = crate::trie::normalize(entry);
                if !domain.is_empty() {
                    scope.include.push(domain);
                }
            }
        }
        scope
    }

    /// Check a page host against the scope.
    ///
    /// Without a page host only exclusion-only scopes match.
    pub fn matches(&self, page_host: Option<&str>) -> bool {
        let Some(page_host) = page_host else {
            return self.include.is_empty();
        };
        if self
            .exclude
            .iter()
            .any(|d| is_same_or_subdomain(page_host, d))
        {
            return false;
        }
        self.include.is_empty()
            || self
                .include
                .iter()
                .any(|d| is_same_or_subdomain(page_host, d))
    }

    fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Options that restrict when a blocking rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleOptions {
    pub third_party: ThirdParty,
    pub domains: Option<DomainScope>,
    pub resource_types: Option<ResourceTypes>,
}

/// Options that turn a rule into something other than a plain block.
const NON_BLOCKING_MODIFIERS: &[&str] = &[
    "csp",
    "redirect",
    "redirect-rule",
    "removeparam",
    "queryprune",
    "badfilter",
    "popup",
    "popunder",
    "generichide",
    "ghide",
    "elemhide",
    "ehide",
    "specifichide",
    "shide",
    "rewrite",
    "replace",
    "cookie",
    "header",
    "permissions",
];

impl RuleOptions {
    /// Parse the text after `$`.
    ///
    /// Unknown or malformed entries are ignored. Only modifiers that change
    /// the rule's action are rejected, because applying them as plain blocks
    /// would block traffic the list never meant to block.
    pub fn parse(text: &str) -> Result<Self, RuleParseError> {
        let mut options = RuleOptions::default();
        let mut include_types = ResourceTypes::empty();
        let mut exclude_types = ResourceTypes::empty();

        for raw in text.split(',') {
            let raw = raw.trim().to_ascii_lowercase();
            if raw.is_empty() {
                continue;
            }

            let name = raw.split('=').next().unwrap_or_default();
            if NON_BLOCKING_MODIFIERS.contains(&name.trim_start_matches('~')) {
                return Err(RuleParseError::UnsupportedModifier(raw));
            }

            if let Some(value) = raw.strip_prefix("domain=") {
                let scope = DomainScope::parse(value);
                if !scope.is_empty() {
                    options.domains = Some(scope);
                }
                continue;
            }

            match raw.as_str() {
                "third-party" | "3p" | "~first-party" | "~1p" => {
                    options.third_party = ThirdParty::OnlyThirdParty;
                    continue;
                }
                "~third-party" | "~3p" | "first-party" | "1p" => {
                    options.third_party = ThirdParty::OnlyFirstParty;
                    continue;
                }
                _ => {}
            }

            let (negated, name) = match raw.strip_prefix('~') {
                Some(rest) => (true, rest),
                None => (false, raw.as_str()),
            };
            if let Some(flag) = ResourceTypes::from_option_name(name) {
                if negated {
                    exclude_types |= flag;
                } else {
                    include_types |= flag;
                }
                continue;
            }

            log::debug!("Ignoring filter option: {}", raw);
        }

        if !include_types.is_empty() || !exclude_types.is_empty() {
            let base = if include_types.is_empty() {
                ResourceTypes::all()
            } else {
                include_types
            };
            options.resource_types = Some(base - exclude_types);
        }

        Ok(options)
    }

    /// True if the rule applies to every request its pattern matches.
    pub fn is_unconditional(&self) -> bool {
        self.third_party == ThirdParty::Any
            && self.domains.is_none()
            && self.resource_types.is_none()
    }

    /// Evaluate the options against a request.
    pub fn matches(&self, ctx: &RequestContext<'_>) -> bool {
        match self.third_party {
            ThirdParty::Any => {}
            ThirdParty::OnlyThirdParty if !ctx.third_party => return false,
            ThirdParty::OnlyFirstParty if ctx.third_party => return false,
            _ => {}
        }

        if let Some(types) = self.resource_types {
            if !types.intersects(ctx.resource_type) {
                return false;
            }
        }

        match &self.domains {
            Some(scope) => scope.matches(ctx.page_host.as_deref()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_third_party() {
        let opts = RuleOptions::parse("third-party").unwrap();
        assert_eq!(opts.third_party, ThirdParty::OnlyThirdParty);

        let opts = RuleOptions::parse("~third-party").unwrap();
        assert_eq!(opts.third_party, ThirdParty::OnlyFirstParty);

        let opts = RuleOptions::parse("1p").unwrap();
        assert_eq!(opts.third_party, ThirdParty::OnlyFirstParty);
    }

    #[test]
    fn test_parse_domains() {
        let opts = RuleOptions::parse("domain=Site.com|~sub.site.com|other.org").unwrap();
        let scope = opts.domains.unwrap();
        assert_eq!(scope.include, vec!["site.com", "other.org"]);
        assert_eq!(scope.exclude, vec!["sub.site.com"]);

        assert!(scope.matches(Some("site.com")));
        assert!(scope.matches(Some("www.site.com")));
        assert!(!scope.matches(Some("sub.site.com")));
        assert!(!scope.matches(Some("a.sub.site.com")));
        assert!(!scope.matches(Some("example.com")));
        assert!(!scope.matches(None));
    }

    #[test]
    fn test_exclusion_only_scope() {
        let opts = RuleOptions::parse("domain=~safe.com").unwrap();
        let scope = opts.domains.unwrap();
        assert!(scope.matches(Some("news.example")));
        assert!(scope.matches(None));
        assert!(!scope.matches(Some("safe.com")));
    }

    #[test]
    fn test_parse_resource_types() {
        let opts = RuleOptions::parse("script,image").unwrap();
        assert_eq!(
            opts.resource_types,
            Some(ResourceTypes::SCRIPT | ResourceTypes::IMAGE)
        );

        let opts = RuleOptions::parse("~script").unwrap();
        let types = opts.resource_types.unwrap();
        assert!(!types.contains(ResourceTypes::SCRIPT));
        assert!(types.contains(ResourceTypes::IMAGE));
    }

    #[test]
    fn test_malformed_options_ignored() {
        let opts = RuleOptions::parse("third-party,,bogus=1,whatever,important").unwrap();
        assert_eq!(opts.third_party, ThirdParty::OnlyThirdParty);
        assert!(opts.domains.is_none());
        assert!(opts.resource_types.is_none());

        let opts = RuleOptions::parse("domain=").unwrap();
        assert!(opts.domains.is_none());
        assert!(opts.is_unconditional());
    }

    #[test]
    fn test_non_blocking_modifiers_rejected() {
        assert!(matches!(
            RuleOptions::parse("redirect=noop.js"),
            Err(RuleParseError::UnsupportedModifier(_))
        ));
        assert!(RuleOptions::parse("csp=script-src 'none'").is_err());
        assert!(RuleOptions::parse("third-party,badfilter").is_err());
        assert!(RuleOptions::parse("removeparam=utm_source").is_err());
    }

    #[test]
    fn test_unconditional() {
        assert!(RuleOptions::default().is_unconditional());
        assert!(!RuleOptions::parse("third-party").unwrap().is_unconditional());
        assert!(!RuleOptions::parse("script").unwrap().is_unconditional());
        assert!(RuleOptions::parse("important").unwrap().is_unconditional());
    }
}
