//! Upstream path resolution.
//!
//! # Responsibilities
//! - Join the inbound path and query string into the upstream request target
//! - Enforce the configured path prefix
//!
//! # Design Decisions
//! - The query separator is always appended, even for an empty query
//! - A target outside the prefix collapses to exactly the prefix and loses its
//!   query string
//! - Matching is a literal prefix test (case-sensitive, not segment-aware)
//! - No `..` or `//` normalization; the upstream owns path semantics

/// Enforces an optional path prefix on upstream request targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathResolver {
    prefix: Option<String>,
}

impl PathResolver {
    /// Create a resolver. Empty prefixes are treated as absent.
    pub fn new(prefix: Option<impl Into<String>>) -> Self {
        Self {
            prefix: prefix.map(Into::into).filter(|p| !p.is_empty()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Resolve the `path?query` target sent upstream.
    pub fn resolve(&self, path: &str, query: &str) -> String {
        let target = format!("{path}?{query}");
        match &self.prefix {
            Some(prefix) if !matches_prefix(&target, prefix) => prefix.clone(),
            _ => target,
        }
    }
}

/// True when `target` starts with `prefix`, optionally preceded by one `/`.
fn matches_prefix(target: &str, prefix: &str) -> bool {
    target.starts_with(prefix)
        || target
            .strip_prefix('/')
            .is_some_and(|rest| rest.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolver(prefix: &str) -> PathResolver {
        PathResolver::new(Some(prefix))
    }

    #[test]
    fn test_no_prefix_keeps_target() {
        let resolver = PathResolver::new(None::<String>);
        assert_eq!(resolver.resolve("/foo", "bar=1"), "/foo?bar=1");
    }

    #[test]
    fn test_empty_query_leaves_trailing_separator() {
        let resolver = PathResolver::new(None::<String>);
        assert_eq!(resolver.resolve("/foo", ""), "/foo?");
    }

    #[test]
    fn test_matching_prefix_keeps_target() {
        assert_eq!(resolver("/v1").resolve("/v1/items", "x=1"), "/v1/items?x=1");
    }

    #[test]
    fn test_mismatch_collapses_to_prefix() {
        assert_eq!(resolver("/v1").resolve("/other", "x=1"), "/v1");
        assert_eq!(resolver("/api").resolve("/wrong/path", ""), "/api");
    }

    #[test]
    fn test_prefix_without_leading_slash() {
        assert_eq!(resolver("api").resolve("/api/users", "id=7"), "/api/users?id=7");
        assert_eq!(resolver("api").resolve("/users", ""), "api");
    }

    #[test]
    fn test_prefix_is_not_segment_aware() {
        assert_eq!(resolver("/v1").resolve("/v10/items", ""), "/v10/items?");
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        assert_eq!(resolver("/api").resolve("/API/x", ""), "/api");
    }

    #[test]
    fn test_empty_prefix_is_ignored() {
        assert_eq!(PathResolver::new(Some("")).prefix(), None);
    }

    proptest! {
        #[test]
        fn prop_resolved_target_respects_prefix(
            prefix in "/[a-z]{1,6}",
            path in "/[a-z/]{0,12}",
            query in "[a-z=&]{0,8}",
        ) {
            let resolved = resolver(&prefix).resolve(&path, &query);
            if resolved != prefix {
                prop_assert!(matches_prefix(&resolved, &prefix));
                prop_assert_eq!(resolved, format!("{path}?{query}"));
            }
        }
    }
}
