use regex::Regex;

use community_images_types::ClassificationResult;

/// Registry prefixes the Kubernetes community has frozen
pub const DEFAULT_DEPRECATED_PREFIXES: [&str; 2] = ["k8s.gcr.io/", "gcr.io/google-containers"];

/// One way of recognising a deprecated registry
#[derive(Clone, Debug)]
pub enum RegistryMatcher {
    /// Exact, case-sensitive prefix of the normalized image
    Prefix(String),

    /// Regular expression searched in the normalized image
    Pattern(Regex),
}

impl RegistryMatcher {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Compile a pattern matcher
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    pub fn matches(&self, image: &str) -> bool {
        match self {
            Self::Prefix(prefix) => image.starts_with(prefix.as_str()),
            Self::Pattern(re) => re.is_match(image),
        }
    }
}

/// Decides whether an image is pulled from a deprecated registry
#[derive(Clone, Debug)]
pub struct Classifier {
    matchers: Vec<RegistryMatcher>,
}

impl Classifier {
    pub fn new(matchers: Vec<RegistryMatcher>) -> Self {
        Self { matchers }
    }

    /// True iff any matcher recognises the image
    pub fn is_deprecated(&self, image: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(image))
    }

    pub fn classify(&self, image: String) -> ClassificationResult {
        let deprecated = self.is_deprecated(&image);
        ClassificationResult::new(image, deprecated)
    }

    pub fn matchers(&self) -> &[RegistryMatcher] {
        &self.matchers
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_DEPRECATED_PREFIXES
                .iter()
                .map(|p| RegistryMatcher::prefix(*p))
                .collect(),
        )
    }
}
