//! Virtual host resolution.
//!
//! # Responsibilities
//! - Derive the subdomain labels of a request from its Host header
//! - Match those labels against a route's subdomain filter
//!
//! # Design Decisions
//! - The registrable suffix is assumed to be two labels (`example.com`), or a
//!   single label for anything ending in `localhost`
//! - Label comparison is exact and case-sensitive
//! - An absent filter always matches (wildcard route)

/// Hostnames ending with this suffix only carry one trailing label.
const LOCALHOST_SUFFIX: &str = "localhost";

/// Derive the ordered subdomain labels from a Host header value.
///
/// `api.example.com:8080` → `["api"]`, `a.b.localhost` → `["a", "b"]`,
/// `localhost` → `[]`. A missing header yields an empty sequence.
pub fn resolve_subdomain(host: Option<&str>) -> Vec<String> {
    let Some(host) = host else {
        return Vec::new();
    };

    let hostname = host.split(':').next().unwrap_or_default();
    let suffix_labels = if hostname.ends_with(LOCALHOST_SUFFIX) { 1 } else { 2 };

    let labels: Vec<&str> = hostname.split('.').collect();
    let keep = labels.len().saturating_sub(suffix_labels);

    labels[..keep].iter().map(|label| label.to_string()).collect()
}

/// Subdomain filter attached to an HTTP-family route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubdomainFilter {
    /// No filter configured: matches every request.
    #[default]
    Any,
    /// Matches only this exact label sequence.
    Exact(Vec<String>),
}

impl SubdomainFilter {
    /// Whether resolved `subdomain` labels satisfy the filter.
    pub fn matches(&self, subdomain: &[String]) -> bool {
        match self {
            SubdomainFilter::Any => true,
            SubdomainFilter::Exact(labels) => labels.as_slice() == subdomain,
        }
    }
}

impl From<Option<Vec<String>>> for SubdomainFilter {
    fn from(labels: Option<Vec<String>>) -> Self {
        match labels {
            Some(labels) => SubdomainFilter::Exact(labels),
            None => SubdomainFilter::Any,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_label_suffix_is_dropped() {
        assert_eq!(resolve_subdomain(Some("api.example.com")), labels(&["api"]));
        assert_eq!(
            resolve_subdomain(Some("v1.api.example.com")),
            labels(&["v1", "api"])
        );
        assert!(resolve_subdomain(Some("example.com")).is_empty());
    }

    #[test]
    fn port_is_stripped() {
        assert_eq!(resolve_subdomain(Some("api.example.com:8443")), labels(&["api"]));
        assert!(resolve_subdomain(Some("example.com:80")).is_empty());
    }

    #[test]
    fn localhost_drops_a_single_label() {
        assert_eq!(resolve_subdomain(Some("sub.localhost")), labels(&["sub"]));
        assert_eq!(resolve_subdomain(Some("a.b.localhost")), labels(&["a", "b"]));
        assert_eq!(resolve_subdomain(Some("a.b.localhost:3000")), labels(&["a", "b"]));
        assert!(resolve_subdomain(Some("localhost")).is_empty());
    }

    #[test]
    fn short_or_missing_hosts_are_empty() {
        assert!(resolve_subdomain(None).is_empty());
        assert!(resolve_subdomain(Some("")).is_empty());
        assert!(resolve_subdomain(Some("intranet")).is_empty());
    }

    #[test]
    fn exact_filter_compares_every_label_in_order() {
        let filter = SubdomainFilter::Exact(labels(&["a", "b"]));
        assert!(filter.matches(&labels(&["a", "b"])));
        assert!(!filter.matches(&labels(&["b", "a"])));
        assert!(!filter.matches(&labels(&["a"])));
        assert!(!filter.matches(&labels(&["a", "b", "c"])));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let filter = SubdomainFilter::Exact(labels(&["api"]));
        assert!(!filter.matches(&labels(&["API"])));
    }

    #[test]
    fn wildcard_matches_everything() {
        let filter = SubdomainFilter::from(None);
        assert_eq!(filter, SubdomainFilter::Any);
        assert!(filter.matches(&[]));
        assert!(filter.matches(&labels(&["anything", "at", "all"])));
    }

    #[test]
    fn empty_filter_only_matches_the_bare_domain() {
        let filter = SubdomainFilter::from(Some(Vec::new()));
        assert!(filter.matches(&resolve_subdomain(Some("example.com"))));
        assert!(!filter.matches(&resolve_subdomain(Some("www.example.com"))));
    }
}
