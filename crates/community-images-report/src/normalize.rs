use std::fmt;

use thiserror::Error;

/// Tag assumed by container runtimes when none is given
pub const DEFAULT_TAG: &str = "latest";

/// Canonicalize an image spec so it always carries a tag or digest.
///
/// A `:` only counts as a tag separator after the last `/`, so registry
/// ports (`host:5000/app`) are left alone.
pub fn normalize(raw: &str) -> String {
    if has_tag_or_digest(raw) {
        raw.to_string()
    } else {
        format!("{}:{}", raw, DEFAULT_TAG)
    }
}

fn has_tag_or_digest(raw: &str) -> bool {
    if raw.contains('@') {
        return true;
    }
    let last_segment = raw.rsplit('/').next().unwrap_or(raw);
    last_segment.contains(':')
}

/// Structured view of a container image string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host, when the first path segment names one
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("image reference is empty")]
    Empty,

    #[error("repository is missing in {0}")]
    MissingRepository(String),

    #[error("empty tag in {0}")]
    EmptyTag(String),

    #[error("empty digest in {0}")]
    EmptyDigest(String),
}

impl ImageReference {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Err(ParseError::Empty);
        }

        let (name_and_tag, digest) = match s.split_once('@') {
            Some((_, "")) => return Err(ParseError::EmptyDigest(s.to_string())),
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (s, None),
        };

        // A tag is a colon after the last slash
        let last_slash = name_and_tag.rfind('/');
        let (name, tag) = match name_and_tag.rfind(':') {
            Some(pos) if last_slash.is_none_or(|slash| pos > slash) => {
                let tag = &name_and_tag[pos + 1..];
                if tag.is_empty() {
                    return Err(ParseError::EmptyTag(s.to_string()));
                }
                (&name_and_tag[..pos], Some(tag.to_string()))
            }
            _ => (name_and_tag, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (Some(first.to_string()), rest),
            _ => (None, name),
        };

        if repository.is_empty() || repository.ends_with('/') {
            return Err(ParseError::MissingRepository(s.to_string()));
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        })
    }
}

/// Docker's rule: the first segment is a host if it looks like one
fn is_registry_host(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_latest() {
        assert_eq!(normalize("repo/image"), "repo/image:latest");
        assert_eq!(normalize("nginx"), "nginx:latest");
    }

    #[test]
    fn test_normalize_keeps_tag_and_digest() {
        assert_eq!(normalize("repo/image:v1"), "repo/image:v1");
        assert_eq!(
            normalize("repo/image@sha256:abcd"),
            "repo/image@sha256:abcd"
        );
    }

    #[test]
    fn test_normalize_ignores_registry_port() {
        assert_eq!(
            normalize("host:5000/repo/image"),
            "host:5000/repo/image:latest"
        );
        assert_eq!(
            normalize("host:5000/repo/image:1.0"),
            "host:5000/repo/image:1.0"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "nginx",
            "repo/image:v1",
            "host:5000/repo/image",
            "k8s.gcr.io/pause@sha256:abcd",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_parse_full_reference() {
        let reference = ImageReference::parse("registry.k8s.io/pause:3.9@sha256:abcd").unwrap();
        assert_eq!(reference.registry.as_deref(), Some("registry.k8s.io"));
        assert_eq!(reference.repository, "pause");
        assert_eq!(reference.tag.as_deref(), Some("3.9"));
        assert_eq!(reference.digest.as_deref(), Some("sha256:abcd"));
        assert_eq!(reference.to_string(), "registry.k8s.io/pause:3.9@sha256:abcd");
    }

    #[test]
    fn test_parse_docker_hub_style() {
        let reference = ImageReference::parse("library/nginx").unwrap();
        assert_eq!(reference.registry, None);
        assert_eq!(reference.repository, "library/nginx");
        assert_eq!(reference.tag, None);
        assert_eq!(reference.to_string(), "library/nginx");
    }

    #[test]
    fn test_parse_registry_with_port() {
        let reference = ImageReference::parse("localhost:5000/team/app").unwrap();
        assert_eq!(reference.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(reference.repository, "team/app");
        assert_eq!(reference.tag, None);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ImageReference::parse(""), Err(ParseError::Empty));
        assert!(matches!(
            ImageReference::parse("nginx:"),
            Err(ParseError::EmptyTag(_))
        ));
        assert!(matches!(
            ImageReference::parse("nginx@"),
            Err(ParseError::EmptyDigest(_))
        ));
        assert!(matches!(
            ImageReference::parse("gcr.io/"),
            Err(ParseError::MissingRepository(_))
        ));
    }
}
