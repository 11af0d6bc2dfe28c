//! Keyword heuristics for ad and tracker URLs.
//!
//! This module provides the cheap keyword gate that decides whether a URL is
//! worth the full wildcard/regex scan, and the final catch-all classifier:
//! - Domain labels that name ad or tracking infrastructure
//! - Path segments typical of ad servers, beacons and pixels
//! - Redirect parameters carrying another absolute URL

use once_cell::sync::Lazy;
use regex::Regex;

/// Substrings that make a URL a candidate for pattern matching.
pub const GATE_KEYWORDS: &[&str] = &["ad", "track", "pixel", "click", "banner", "sponsor"];

static GATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&GATE_KEYWORDS.join("|")).expect("gate keywords are literal")
});

/// Whole domain labels (or label prefixes followed by a digit or dash).
static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (^|[.\-])
        (ads?|adserver|adservice|adsystem|adtech|adnxs|advert|advertising
        |tracking|tracker|telemetry|pixel|banners?|sponsor(ed)?|clicks?|clicktrack)
        ([.\-0-9]|$)
    ",
    )
    .expect("domain heuristic pattern is valid")
});

/// Legitimate hosts that trip the domain pattern.
static DOMAIN_FALSE_POSITIVES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        # parcel tracking
        (^|\.)(fedex|ups|usps|dhl|royalmail|canadapost|17track)\.
        |
        # browser add-on stores
        (^|\.)addons\.
    ",
    )
    .expect("false positive pattern is valid")
});

static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        /ads?/ | /adserver | /adview | /advert | /banners?/ | /sponsor
        | /track(ing)?/ | /tracker | /pixel(\.gif|\.png|/|\?) | /beacon
        | /impression | /clicktrack
        | [?&](ad_?id|adunit|ad_slot)=
    ",
    )
    .expect("path heuristic pattern is valid")
});

static REDIRECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        [?&](url|u|adurl|dest|destination|goto)=https?(:|%3a)
        | [?&]redirect(_url|_uri)?=
    ",
    )
    .expect("redirect heuristic pattern is valid")
});

/// Check whether a lowercased URL contains any ad-ish keyword.
///
/// # Example
/// ```
/// use adgate::heuristic::passes_keyword_gate;
///
/// assert!(passes_keyword_gate("https://cdn.example/banner.png"));
/// assert!(!passes_keyword_gate("https://cdn.example/style.css"));
/// ```
#[inline]
pub fn passes_keyword_gate(url_lower: &str) -> bool {
    GATE_PATTERN.is_match(url_lower)
}

/// Host whose labels name ad or tracking infrastructure.
pub fn is_suspicious_domain(host: &str) -> bool {
    DOMAIN_PATTERN.is_match(host) && !DOMAIN_FALSE_POSITIVES.is_match(host)
}

/// Path (with query) typical of ad delivery or beacons.
pub fn is_suspicious_path(path_lower: &str) -> bool {
    PATH_PATTERN.is_match(path_lower)
}

/// Query parameters that bounce the browser to another absolute URL.
pub fn has_suspicious_redirect(url_lower: &str) -> bool {
    REDIRECT_PATTERN.is_match(url_lower)
}

/// Final catch-all. All inputs are expected lowercased.
pub fn is_likely_ad(host: &str, path_lower: &str, url_lower: &str) -> bool {
    is_suspicious_domain(host) || is_suspicious_path(path_lower) || has_suspicious_redirect(url_lower)
}
