//! Shared types for community-images
//!
//! This crate contains data structures used across multiple community-images crates.

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Cluster Types
// ============================================================================

/// A resolved cluster connection target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextInfo {
    pub name: String,
    /// API server host, derived from the cluster URL
    pub host: String,
}

impl ContextInfo {
    pub fn new(name: String, host: String) -> Self {
        Self { name, host }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure while resolving or talking to a cluster context
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("kubeconfig error: {0}")]
    Config(String),

    #[error("kubeconfig has no current context set")]
    NoCurrentContext,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("cluster unreachable: {0}")]
    Connectivity(String),

    #[error("API server returned {code}: {message}")]
    Api { code: u16, message: String },
}

impl ClusterError {
    /// Category of this error, used for structured output
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NoCurrentContext => ErrorKind::NoCurrentContext,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Permission(_) => ErrorKind::Permission,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Api { .. } => ErrorKind::Api,
        }
    }

    /// Only transport-level failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    NoCurrentContext,
    Auth,
    Permission,
    Connectivity,
    Api,
}

// ============================================================================
// Classification Types
// ============================================================================

/// A normalized image paired with its registry verdict
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub image: String,
    pub deprecated: bool,
}

impl ClassificationResult {
    pub fn new(image: String, deprecated: bool) -> Self {
        Self { image, deprecated }
    }
}
