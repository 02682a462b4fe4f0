//! Image reference parsing.
//!
//! Splits references like `quay.io/acme/widget:v2` into registry, namespace,
//! repository and tag or digest, and formats them back.

use crate::error::ReferenceError;
use std::fmt;
use std::str::FromStr;

/// Tag assumed when the reference carries neither tag nor digest.
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub namespace: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference string.
    ///
    /// - `widget` → repository only, tag `latest`
    /// - `acme/widget` → namespace `acme`
    /// - `quay.io/widget`, `localhost:5000/widget` → registry (first segment has `.` or `:`)
    /// - `quay.io/acme/widget:v2` → registry, namespace, repository, tag
    /// - `...widget@sha256:abc` → digest, no tag
    ///
    /// Only the first two slashes split; anything after them stays in the repository.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let mut result = ImageReference::default();
        let segments: Vec<&str> = reference.splitn(3, '/').collect();
        match segments.as_slice() {
            [first, _] => {
                if first.contains('.') || first.contains(':') {
                    result.registry = Some(first.to_string());
                } else {
                    result.namespace = Some(first.to_string());
                }
            }
            [registry, namespace, _] => {
                result.registry = Some(registry.to_string());
                result.namespace = Some(namespace.to_string());
            }
            // A bare repository with no slash at all.
            _ => {}
        }

        let last = segments.last().copied().unwrap_or_default();
        if let Some((repository, digest)) = last.rsplit_once('@') {
            result.repository = repository.to_string();
            result.digest = Some(digest.to_string());
        } else if let Some((repository, tag)) = last.rsplit_once(':') {
            result.repository = repository.to_string();
            result.tag = Some(tag.to_string());
        } else {
            result.repository = last.to_string();
            result.tag = Some(DEFAULT_TAG.to_string());
        }

        if result.repository.is_empty() {
            return Err(ReferenceError::EmptyRepository(reference.to_string()));
        }
        Ok(result)
    }

    /// Full name: registry, namespace and repository plus digest or tag.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            self.registry.as_deref(),
            self.namespace.as_deref(),
            Some(self.repository.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();
        write!(f, "{}", parts.join("/"))?;

        if let Some(digest) = self.digest.as_deref().filter(|d| !d.is_empty()) {
            write!(f, "@{}", digest)
        } else if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            write!(f, ":{}", tag)
        } else {
            Ok(())
        }
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageReference::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(
        registry: Option<&str>,
        namespace: Option<&str>,
        repository: &str,
        tag: Option<&str>,
        digest: Option<&str>,
    ) -> ImageReference {
        ImageReference {
            registry: registry.map(str::to_string),
            namespace: namespace.map(str::to_string),
            repository: repository.to_string(),
            tag: tag.map(str::to_string),
            digest: digest.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_full_reference() {
        let r = ImageReference::parse("quay.io/acme/widget:v2").unwrap();
        assert_eq!(r.registry.as_deref(), Some("quay.io"));
        assert_eq!(r.namespace.as_deref(), Some("acme"));
        assert_eq!(r.repository, "widget");
        assert_eq!(r.tag.as_deref(), Some("v2"));
        assert_eq!(r.digest, None);
        assert_eq!(r.to_string(), "quay.io/acme/widget:v2");
    }

    #[test]
    fn test_two_segments_with_dot_is_registry() {
        let r = ImageReference::parse("quay.io/widget").unwrap();
        assert_eq!(r.registry.as_deref(), Some("quay.io"));
        assert_eq!(r.namespace, None);
        assert_eq!(r.repository, "widget");
    }

    #[test]
    fn test_two_segments_with_port_is_registry() {
        let r = ImageReference::parse("localhost:5000/widget:1.0").unwrap();
        assert_eq!(r.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(r.namespace, None);
        assert_eq!(r.tag.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_two_plain_segments_is_namespace() {
        let r = ImageReference::parse("acme/widget").unwrap();
        assert_eq!(r.registry, None);
        assert_eq!(r.namespace.as_deref(), Some("acme"));
        assert_eq!(r.tag.as_deref(), Some(DEFAULT_TAG));
    }

    #[test]
    fn test_default_tag_is_latest() {
        let r = ImageReference::parse("quay.io/acme/widget").unwrap();
        assert_eq!(r.tag.as_deref(), Some("latest"));
        assert_eq!(r.digest, None);
        assert_eq!(r.name(), "quay.io/acme/widget:latest");
    }

    #[test]
    fn test_digest_takes_precedence_over_tag() {
        let r = ImageReference::parse("quay.io/acme/widget@sha256:abc").unwrap();
        assert_eq!(r.repository, "widget");
        assert_eq!(r.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(r.tag, None);
    }

    #[test]
    fn test_tag_before_digest_stays_in_repository() {
        let r = ImageReference::parse("acme/widget:v1@sha256:abc").unwrap();
        assert_eq!(r.repository, "widget:v1");
        assert_eq!(r.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(r.to_string(), "acme/widget:v1@sha256:abc");
    }

    #[test]
    fn test_extra_slashes_stay_in_repository() {
        let r = ImageReference::parse("quay.io/acme/team/widget:v2").unwrap();
        assert_eq!(r.namespace.as_deref(), Some("acme"));
        assert_eq!(r.repository, "team/widget");
    }

    // Bare repositories take neither branch of the segment split; only the
    // repository is set. Pinned here as current behavior.
    #[test]
    fn test_zero_slash_reference_with_digest() {
        let r = ImageReference::parse("widget@sha256:abc").unwrap();
        assert_eq!(r.registry, None);
        assert_eq!(r.namespace, None);
        assert_eq!(r.repository, "widget");
        assert_eq!(r.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(r.tag, None);
    }

    #[test]
    fn test_zero_slash_reference_plain() {
        let r = ImageReference::parse("widget").unwrap();
        assert_eq!(r, reference(None, None, "widget", Some("latest"), None));
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        assert_eq!(ImageReference::parse(""), Err(ReferenceError::Empty));
        assert!(matches!(
            ImageReference::parse("quay.io/acme/:v1"),
            Err(ReferenceError::EmptyRepository(_))
        ));
    }

    #[test]
    fn test_format_then_parse_is_stable() {
        let registries = [None, Some("registry.example.com")];
        let namespaces = [None, Some("acme")];
        let suffixes: [(Option<&str>, Option<&str>); 3] = [
            (Some("v2"), None),
            (None, Some("sha256:0123abcd")),
            (None, None),
        ];

        for registry in registries {
            for namespace in namespaces {
                for (tag, digest) in suffixes {
                    let original = reference(registry, namespace, "widget", tag, digest);
                    let parsed: ImageReference = original.to_string().parse().unwrap();

                    assert_eq!(parsed.registry, original.registry);
                    assert_eq!(parsed.namespace, original.namespace);
                    assert_eq!(parsed.repository, original.repository);
                    assert_eq!(parsed.digest, original.digest);
                    // With neither set, parsing fills in the default tag.
                    let expected_tag = match (tag, digest) {
                        (None, None) => Some(DEFAULT_TAG.to_string()),
                        _ => original.tag.clone(),
                    };
                    assert_eq!(parsed.tag, expected_tag, "for {}", original);
                }
            }
        }
    }
}
