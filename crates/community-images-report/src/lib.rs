//! Image classification and reporting for community-images
//!
//! This crate normalizes image references, classifies them against the
//! deprecated community registries, and drives the per-context report.

mod classify;
mod config;
mod driver;
mod normalize;
mod progress;
mod render;

pub use classify::{Classifier, DEFAULT_DEPRECATED_PREFIXES, RegistryMatcher};
pub use config::RunConfiguration;
pub use driver::{ContextOutcome, ContextReport, ReportDriver, RunReport};
pub use normalize::{DEFAULT_TAG, ImageReference, ParseError, normalize};
pub use progress::{NoProgress, Progress};
pub use render::{JsonRenderer, OutputFormat, Renderer, TextRenderer, renderer_for};

// Re-export types used in our public API
pub use community_images_types::{ClassificationResult, ClusterError, ErrorKind};
