//! Kubernetes client for community-images
//!
//! This crate provides kubeconfig context resolution, per-context clients,
//! and enumeration of the container images used by live pods.

mod client;
mod enumerate;
mod resolver;

pub use client::{ContextClient, KubeClient, KubeOptions, classify_kube_error};
pub use enumerate::{
    Cluster, EnumerateOptions, PodLister, PodScope, RetryPolicy, collect_images, enumerate_images,
};
pub use resolver::{KubeconfigSource, resolve_contexts};

// Re-export types that are used in our public API
pub use community_images_types::{ClusterError, ContextInfo, ErrorKind};
