use std::collections::BTreeSet;

use community_images_k8s::{EnumerateOptions, PodScope};

use crate::classify::Classifier;
use crate::render::OutputFormat;

/// Contexts enumerated at once when nothing else is configured
const DEFAULT_CONCURRENCY: usize = 4;

/// Everything a run needs, resolved once at startup
#[derive(Clone, Debug)]
pub struct RunConfiguration {
    /// Explicit contexts (empty = use the kubeconfig's current context)
    pub contexts: Vec<String>,

    /// Namespaces to skip
    pub ignored_namespaces: BTreeSet<String>,

    /// Restrict enumeration to a single namespace
    pub namespace: Option<String>,

    /// Suppress lines for images on current registries
    pub only_deprecated: bool,

    pub classifier: Classifier,

    /// Timeout and retry policy per context
    pub enumerate: EnumerateOptions,

    /// Maximum number of contexts enumerated concurrently
    pub concurrency: usize,

    pub output: OutputFormat,
}

impl RunConfiguration {
    /// Pod scope shared by every context
    pub fn pod_scope(&self) -> PodScope {
        PodScope::all_namespaces(self.ignored_namespaces.clone())
            .in_namespace(self.namespace.clone())
    }
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            contexts: Vec::new(),
            ignored_namespaces: BTreeSet::new(),
            namespace: None,
            only_deprecated: false,
            classifier: Classifier::default(),
            enumerate: EnumerateOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
            output: OutputFormat::default(),
        }
    }
}
