//! Built-in tables compiled into every rule database.

/// Hosts that must never be blocked: payments, captchas and sign-in.
/// Parents cover their subdomains (`js.stripe.com` via `stripe.com`).
pub const CRITICAL_DOMAINS: &[&str] = &[
    "stripe.com",
    "stripe.network",
    "paypal.com",
    "paypalobjects.com",
    "braintreegateway.com",
    "adyen.com",
    "checkout.com",
    "recaptcha.net",
    "hcaptcha.com",
    "challenges.cloudflare.com",
    "accounts.google.com",
    "appleid.apple.com",
    "login.microsoftonline.com",
    "login.live.com",
];

/// Ad and telemetry paths served from the same host as the page.
pub const FIRST_PARTY_AD_PATHS: &[(&str, &[&str])] = &[
    (
        "youtube.com",
        &["/api/stats/ads", "/pagead/", "/ptracking", "/get_midroll_info"],
    ),
    ("google.com", &["/pagead/", "/adsense/", "/gen_204"]),
    ("facebook.com", &["/tr/", "/tr?"]),
    ("twitter.com", &["/i/adsct", "/1.1/promoted_content/"]),
    ("x.com", &["/i/adsct", "/1.1/promoted_content/"]),
    ("amazon.com", &["/gp/adsystem", "/aax2/"]),
    ("linkedin.com", &["/li/track", "/px/"]),
    ("pinterest.com", &["/ct/", "/v3/conversions/"]),
    ("reddit.com", &["/api/v2/ad_event", "/rp.gif"]),
];

/// First labels used to alias third-party trackers behind a site's own
/// domain, mapped to the tracker domains they CNAME to. A label may point at
/// several trackers.
pub const CNAME_ALIASES: &[(&str, &[&str])] = &[
    ("smetrics", &["omtrdc.net", "2o7.net"]),
    ("sstats", &["omtrdc.net", "2o7.net"]),
    ("metrics", &["omtrdc.net"]),
    ("ea", &["eulerian.net"]),
    ("eulerian", &["eulerian.net"]),
    ("tk", &["commander1.com"]),
    ("tc", &["commander1.com"]),
    ("xiti", &["xiti.com", "at-o.net"]),
    ("trk", &["keyade.com", "k.keyade.com"]),
    ("affex", &["affex.org"]),
];
