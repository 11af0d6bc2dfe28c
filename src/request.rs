//! Request descriptions and URL helpers used on the classification path.

use url::Url;

use crate::rule::ResourceTypes;

/// Query parameters that commonly carry the real destination of a tracking link.
const REDIRECT_PARAMS: &[&str] = &[
    "url",
    "u",
    "target",
    "dest",
    "destination",
    "r",
    "redirect",
    "redirect_url",
    "redirect_uri",
    "adurl",
    "goto",
    "link",
    "out",
    "to",
];

/// One request as reported by the interception layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationRequest<'a> {
    pub url: &'a str,
    pub page_url: Option<&'a str>,
    pub is_main_frame: bool,
}

impl<'a> ClassificationRequest<'a> {
    /// A sub-resource request with no known page.
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            page_url: None,
            is_main_frame: false,
        }
    }

    /// Set the URL of the page issuing the request.
    pub fn with_page(mut self, page_url: &'a str) -> Self {
        self.page_url = Some(page_url);
        self
    }

    /// Mark the request as a top-level navigation.
    pub fn main_frame(mut self) -> Self {
        self.is_main_frame = true;
        self
    }
}

/// Parsed view of a request, built once per cache miss.
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub url: &'a str,
    pub url_lower: String,
    /// Lowercased host of the request
    pub host: String,
    /// Lowercased host of the page, when known
    pub page_host: Option<String>,
    /// Lowercased path plus query
    pub path_lower: String,
    /// Same host as the page (ignoring `www.`)
    pub first_party: bool,
    /// Request and page belong to different sites; true when the page is unknown
    pub third_party: bool,
    pub resource_type: ResourceTypes,
}

impl<'a> RequestContext<'a> {
    /// Parse a request. Returns `None` for URLs without a usable host.
    pub fn parse(request: &ClassificationRequest<'a>) -> Option<Self> {
        let parsed = Url::parse(request.url).ok()?;
        let host = host_of(&parsed)?;
        let page_host = request
            .page_url
            .and_then(|page| Url::parse(page).ok())
            .and_then(|page| host_of(&page));

        let (first_party, third_party) = match page_host.as_deref() {
            Some(page) => {
                let first = strip_www(&host) == strip_www(page);
                (first, !first && !is_same_site(&host, page))
            }
            None => (false, true),
        };

        let mut path_lower = parsed.path().to_ascii_lowercase();
        if let Some(query) = parsed.query() {
            path_lower.push('?');
            path_lower.push_str(&query.to_ascii_lowercase());
        }

        let resource_type = if request.is_main_frame {
            ResourceTypes::DOCUMENT
        } else {
            infer_resource_type(parsed.path())
        };

        Some(Self {
            url: request.url,
            url_lower: request.url.to_ascii_lowercase(),
            host,
            page_host,
            path_lower,
            first_party,
            third_party,
            resource_type,
        })
    }
}

fn host_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Two-label public suffixes under which sites register a third label.
const TWO_PART_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "gov.uk", "ac.uk", "co.jp", "ne.jp", "or.jp", "ac.jp", "co.nz", "net.nz",
    "co.za", "co.in", "co.kr", "com.au", "net.au", "org.au", "gov.au", "com.br", "com.cn",
    "com.mx", "com.tw", "com.hk",
];

/// Registrable part of a host: the last two labels, or three under a known
/// two-part suffix. IP addresses and single labels are returned whole.
pub fn registrable_domain(host: &str) -> &str {
    let is_ip = host.starts_with('[')
        || host
            .rsplit('.')
            .next()
            .is_some_and(|tld| !tld.is_empty() && tld.bytes().all(|b| b.is_ascii_digit()));
    if is_ip {
        return host;
    }

    let mut dots = host.rmatch_indices('.').map(|(i, _)| i);
    let Some(second) = dots.nth(1) else {
        return host;
    };
    if !TWO_PART_SUFFIXES.contains(&&host[second + 1..]) {
        return &host[second + 1..];
    }
    match dots.next() {
        Some(third) => &host[third + 1..],
        None => host,
    }
}

/// True if both hosts share a registrable domain.
pub fn is_same_site(a: &str, b: &str) -> bool {
    registrable_domain(a) == registrable_domain(b)
}

/// True if `host` equals `domain` or ends with `.domain`.
#[inline]
pub fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    if host.len() == domain.len() {
        return host == domain;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Iterate a host and each of its parent domains, longest first.
///
/// `a.b.com` yields `a.b.com`, `b.com`, `com`.
pub fn domain_ancestors(host: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(host);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.find('.').map(|pos| &current[pos + 1..]);
        Some(current)
    })
}

/// Schemes that never reach the network.
pub fn is_exempt_scheme(url: &str) -> bool {
    let head = url.get(..5).unwrap_or(url);
    head.eq_ignore_ascii_case("data:") || head.eq_ignore_ascii_case("blob:")
}

/// Guess a request's resource type from its path extension.
pub fn infer_resource_type(path: &str) -> ResourceTypes {
    let last = path.rsplit('/').next().unwrap_or_default();
    let Some((_, ext)) = last.rsplit_once('.') else {
        return ResourceTypes::OTHER;
    };
    match ext.to_ascii_lowercase().as_str() {
        "js" | "mjs" => ResourceTypes::SCRIPT,
        "css" => ResourceTypes::STYLESHEET,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "ico" | "avif" | "bmp" => {
            ResourceTypes::IMAGE
        }
        "woff" | "woff2" | "ttf" | "otf" | "eot" => ResourceTypes::FONT,
        "mp4" | "webm" | "mp3" | "m3u8" | "ogg" | "wav" | "m4a" => ResourceTypes::MEDIA,
        "html" | "htm" => ResourceTypes::SUBDOCUMENT,
        "swf" => ResourceTypes::OBJECT,
        _ => ResourceTypes::OTHER,
    }
}

/// Pull a navigable destination out of a tracking URL's query string.
///
/// # Example
/// ```
/// use adgate::extract_redirect_target;
///
/// let target = extract_redirect_target(
///     "https://track.example/go?url=https%3A%2F%2Fdest.example%2Fpage",
/// );
/// assert_eq!(target.as_deref(), Some("https://dest.example/page"));
/// ```
pub fn extract_redirect_target(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.query_pairs().find_map(|(key, value)| {
        let key = key.to_ascii_lowercase();
        if !REDIRECT_PARAMS.contains(&key.as_str()) {
            return None;
        }
        let lower = value.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return None;
        }
        let target = Url::parse(&value).ok()?;
        target.host_str()?;
        Some(value.into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_extraction() {
        assert_eq!(
            extract_redirect_target("https://track.example/go?url=https%3A%2F%2Fdest.example%2Fpage")
                .as_deref(),
            Some("https://dest.example/page")
        );
        assert_eq!(
            extract_redirect_target("https://ad.example/c?id=1&adurl=http://shop.example/x?y=1")
                .as_deref(),
            Some("http://shop.example/x?y=1")
        );
        assert_eq!(
            extract_redirect_target("https://t.example/?r=/relative/path"),
            None
        );
        assert_eq!(extract_redirect_target("https://t.example/?q=https://x.example"), None);
        assert_eq!(extract_redirect_target("not a url"), None);
    }

    #[test]
    fn test_context_parties() {
        let req = ClassificationRequest::new("https://www.news.example/a.js")
            .with_page("https://news.example/");
        let ctx = RequestContext::parse(&req).unwrap();
        assert!(ctx.first_party);
        assert!(!ctx.third_party);
        assert_eq!(ctx.resource_type, ResourceTypes::SCRIPT);

        let req = ClassificationRequest::new("https://cdn.news.example/a.png")
            .with_page("https://news.example/");
        let ctx = RequestContext::parse(&req).unwrap();
        assert!(!ctx.first_party);
        assert!(!ctx.third_party);

        let req = ClassificationRequest::new("https://ad.doubleclick.net/x.js")
            .with_page("https://news.example/");
        let ctx = RequestContext::parse(&req).unwrap();
        assert!(!ctx.first_party);
        assert!(ctx.third_party);
        assert_eq!(ctx.host, "ad.doubleclick.net");
        assert_eq!(ctx.page_host.as_deref(), Some("news.example"));
    }

    #[test]
    fn test_sibling_hosts_are_same_site() {
        let req = ClassificationRequest::new("https://img.example.com/a.png")
            .with_page("https://www.example.com/");
        let ctx = RequestContext::parse(&req).unwrap();
        assert!(!ctx.first_party);
        assert!(!ctx.third_party);

        let req = ClassificationRequest::new("https://static.shop.co.uk/a.png")
            .with_page("https://www.shop.co.uk/");
        assert!(!RequestContext::parse(&req).unwrap().third_party);

        let req = ClassificationRequest::new("https://other.co.uk/a.png")
            .with_page("https://www.shop.co.uk/");
        assert!(RequestContext::parse(&req).unwrap().third_party);
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("a.b.example.com"), "example.com");
        assert_eq!(registrable_domain("example.com"), "example.com");
        assert_eq!(registrable_domain("www.bbc.co.uk"), "bbc.co.uk");
        assert_eq!(registrable_domain("co.uk"), "co.uk");
        assert_eq!(registrable_domain("localhost"), "localhost");
        assert_eq!(registrable_domain("192.168.1.20"), "192.168.1.20");
        assert!(!is_same_site("10.0.1.20", "10.0.2.20"));
        assert!(is_same_site("cdn.tiktok.com", "www.tiktok.com"));
    }

    #[test]
    fn test_context_path_and_type() {
        let req = ClassificationRequest::new("https://X.example/Ads/Banner.PNG?Size=1").main_frame();
        let ctx = RequestContext::parse(&req).unwrap();
        assert_eq!(ctx.host, "x.example");
        assert_eq!(ctx.path_lower, "/ads/banner.png?size=1");
        assert_eq!(ctx.resource_type, ResourceTypes::DOCUMENT);
        assert!(ctx.third_party);

        assert!(RequestContext::parse(&ClassificationRequest::new("garbage")).is_none());
        assert!(RequestContext::parse(&ClassificationRequest::new("mailto:a@b.c")).is_none());
    }

    #[test]
    fn test_subdomain_helpers() {
        assert!(is_same_or_subdomain("a.b.com", "b.com"));
        assert!(is_same_or_subdomain("b.com", "b.com"));
        assert!(!is_same_or_subdomain("ab.com", "b.com"));
        assert!(!is_same_or_subdomain("com", "b.com"));

        let ancestors: Vec<_> = domain_ancestors("a.b.com").collect();
        assert_eq!(ancestors, vec!["a.b.com", "b.com", "com"]);
    }

    #[test]
    fn test_exempt_schemes() {
        assert!(is_exempt_scheme("data:image/png;base64,AAAA"));
        assert!(is_exempt_scheme("BLOB:https://x.example/1"));
        assert!(!is_exempt_scheme("https://x.example/"));
        assert!(!is_exempt_scheme("dat"));
    }

    #[test]
    fn test_infer_resource_type() {
        assert_eq!(infer_resource_type("/a/b.js"), ResourceTypes::SCRIPT);
        assert_eq!(infer_resource_type("/a/b.WEBP"), ResourceTypes::IMAGE);
        assert_eq!(infer_resource_type("/a/b"), ResourceTypes::OTHER);
        assert_eq!(infer_resource_type("/"), ResourceTypes::OTHER);
    }
}
