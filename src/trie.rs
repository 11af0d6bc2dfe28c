//! Reversed-label domain trie for hierarchical domain blocking.

use ahash::AHashMap;

#[derive(Default)]
struct TrieNode {
    children: AHashMap<Box<str>, TrieNode>,
    /// A domain terminates here; it and every subdomain are covered.
    blocked: bool,
}

impl TrieNode {
    fn is_prunable(&self) -> bool {
        !self.blocked && self.children.is_empty()
    }
}

/// Domain suffix trie keyed on labels in reverse order (TLD first).
///
/// Adding `ads.example.com` covers `tracker.ads.example.com` but not
/// `example.com`. Lookups walk one node per label and stop at the first
/// flagged node.
///
/// # Examples
/// ```
/// use adgate::DomainTrie;
///
/// let mut trie = DomainTrie::new();
/// trie.add("ads.example.com");
/// assert!(trie.is_blocked("cdn.ads.example.com"));
/// assert!(!trie.is_blocked("example.com"));
/// ```
#[derive(Default)]
pub struct DomainTrie {
    root: TrieNode,
    len: usize,
}

impl DomainTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a domain. Blank input is ignored.
    pub fn add(&mut self, domain: &str) {
        let domain = normalize(domain);
        if domain.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for label in domain.split('.').rev() {
            node = node.children.entry(Box::from(label)).or_default();
        }
        if !node.blocked {
            node.blocked = true;
            self.len += 1;
        }
    }

    /// Remove a domain that was added exactly. Returns whether it was present.
    ///
    /// Ancestors and descendants added separately stay in place.
    pub fn remove(&mut self, domain: &str) -> bool {
        let domain = normalize(domain);
        if domain.is_empty() {
            return false;
        }
        let labels: Vec<&str> = domain.split('.').rev().collect();
        let removed = remove_labels(&mut self.root, &labels);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// True if the domain or any of its ancestors was added.
    pub fn is_blocked(&self, domain: &str) -> bool {
        self.is_blocked_normalized(&normalize(domain))
    }

    /// [`is_blocked`](Self::is_blocked) for a host that is already lowercase
    /// and trimmed, as produced by [`RequestContext`](crate::RequestContext).
    #[inline]
    pub fn is_blocked_normalized(&self, domain: &str) -> bool {
        if domain.is_empty() {
            return false;
        }
        let mut node = &self.root;
        for label in domain.rsplit('.') {
            match node.children.get(label) {
                Some(child) => {
                    if child.blocked {
                        return true;
                    }
                    node = child;
                }
                None => return false,
            }
        }
        false
    }

    /// True only if this exact domain was added.
    pub fn is_exact_match(&self, domain: &str) -> bool {
        self.is_exact_match_normalized(&normalize(domain))
    }

    /// [`is_exact_match`](Self::is_exact_match) without normalizing.
    pub fn is_exact_match_normalized(&self, domain: &str) -> bool {
        if domain.is_empty() {
            return false;
        }
        let mut node = &self.root;
        for label in domain.rsplit('.') {
            match node.children.get(label) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.blocked
    }

    /// Number of distinct domains stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn remove_labels(node: &mut TrieNode, labels: &[&str]) -> bool {
    let Some((first, rest)) = labels.split_first() else {
        if node.blocked {
            node.blocked = false;
            return true;
        }
        return false;
    };

    let Some(child) = node.children.get_mut(*first) else {
        return false;
    };
    let removed = remove_labels(child, rest);
    if removed && child.is_prunable() {
        node.children.remove(*first);
    }
    removed
}

/// Lowercase, trim and strip wildcard/dot decorations from a domain.
///
/// Returns an empty string for input that has no usable labels.
pub fn normalize(domain: &str) -> String {
    let domain = domain.trim();
    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    let domain = domain.trim_matches('.');
    if domain.is_empty() || domain.split('.').any(|label| label.is_empty()) {
        return String::new();
    }
    domain.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subdomains_blocked() {
        let mut trie = DomainTrie::new();
        trie.add("ads.example.com");

        assert!(trie.is_blocked("ads.example.com"));
        assert!(trie.is_blocked("tracker.ads.example.com"));
        assert!(trie.is_blocked("a.b.c.ads.example.com"));
        assert!(!trie.is_blocked("example.com"));
        assert!(!trie.is_blocked("com"));
        assert!(!trie.is_blocked("notads.example.com"));
        assert!(!trie.is_blocked("ads.example.org"));
    }

    #[test]
    fn test_case_and_decorations() {
        let mut trie = DomainTrie::new();
        trie.add("  DoubleClick.NET. ");
        trie.add("*.tracker.io");

        assert!(trie.is_blocked("ad.doubleclick.net"));
        assert!(trie.is_blocked("AD.DOUBLECLICK.NET"));
        assert!(trie.is_exact_match("tracker.io"));
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn test_normalized_lookups() {
        let mut trie = DomainTrie::new();
        trie.add("Ads.Example.com");

        assert!(trie.is_blocked_normalized("cdn.ads.example.com"));
        assert!(trie.is_exact_match_normalized("ads.example.com"));
        assert!(!trie.is_exact_match_normalized("cdn.ads.example.com"));
        assert!(!trie.is_blocked_normalized(""));
        // Callers are expected to lowercase first
        assert!(!trie.is_blocked_normalized("ADS.EXAMPLE.COM"));
    }

    #[test]
    fn test_exact_match() {
        let mut trie = DomainTrie::new();
        trie.add("ads.example.com");

        assert!(trie.is_exact_match("ads.example.com"));
        assert!(!trie.is_exact_match("x.ads.example.com"));
        assert!(!trie.is_exact_match("example.com"));
    }

    #[test]
    fn test_blank_domains_rejected() {
        let mut trie = DomainTrie::new();
        trie.add("");
        trie.add("   ");
        trie.add(".");
        trie.add("a..b");
        assert!(trie.is_empty());
        assert!(!trie.is_blocked(""));
        assert!(!trie.remove(""));
    }

    #[test]
    fn test_remove() {
        let mut trie = DomainTrie::new();
        trie.add("example.com");
        trie.add("ads.example.com");
        assert_eq!(trie.len(), 2);

        assert!(trie.remove("example.com"));
        assert!(!trie.is_blocked("www.example.com"));
        assert!(trie.is_blocked("x.ads.example.com"));

        assert!(trie.remove("ads.example.com"));
        assert!(!trie.is_blocked("x.ads.example.com"));
        assert!(!trie.remove("ads.example.com"));
        assert!(trie.is_empty());
        assert!(trie.root.children.is_empty());
    }

    #[test]
    fn test_duplicate_add_counts_once() {
        let mut trie = DomainTrie::new();
        trie.add("a.com");
        trie.add("A.com");
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Example.COM"), "example.com");
        assert_eq!(normalize("*.example.com"), "example.com");
        assert_eq!(normalize(".example.com."), "example.com");
        assert_eq!(normalize("a..com"), "");
    }
}
