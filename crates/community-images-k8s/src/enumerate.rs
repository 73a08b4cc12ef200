use std::collections::BTreeSet;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, warn};

use community_images_types::{ClusterError, ContextInfo};

/// Which pods an enumeration covers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodScope {
    /// Restrict listing to a single namespace (None = all namespaces)
    pub namespace: Option<String>,

    /// Namespaces whose pods are never inspected
    pub ignored_namespaces: BTreeSet<String>,
}

impl PodScope {
    /// Scope covering every namespace except the ignored ones
    pub fn all_namespaces(ignored_namespaces: BTreeSet<String>) -> Self {
        Self {
            namespace: None,
            ignored_namespaces,
        }
    }

    /// Restrict the scope to one namespace
    pub fn in_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Check whether pods in `namespace` belong to this scope
    pub fn includes(&self, namespace: &str) -> bool {
        if let Some(only) = &self.namespace {
            if only != namespace {
                return false;
            }
        }
        !self.ignored_namespaces.contains(namespace)
    }

    /// Server-side field selector excluding the ignored namespaces
    pub fn field_selector(&self) -> Option<String> {
        if self.ignored_namespaces.is_empty() {
            return None;
        }
        Some(
            self.ignored_namespaces
                .iter()
                .map(|ns| format!("metadata.namespace!={}", ns))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// A connection to one cluster context that can list pods
#[allow(async_fn_in_trait)]
pub trait PodLister {
    /// The context this connection was built for
    fn context(&self) -> &ContextInfo;

    /// List every pod in `scope`. Read-only.
    async fn list_pods(&self, scope: &PodScope) -> Result<Vec<Pod>, ClusterError>;
}

/// Builds per-context connections
#[allow(async_fn_in_trait)]
pub trait Cluster {
    type Connection: PodLister;

    async fn connect(&self, context: &str) -> Result<Self::Connection, ClusterError>;
}

/// Bounded retry for transient connectivity failures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,

    /// Delay before the second attempt; doubles after that
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay to wait after `attempt` (1-based) failed
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Limits applied to each context's enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumerateOptions {
    /// Upper bound for a single list attempt
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EnumerateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// List pods through `lister` and return the distinct images they run, sorted
pub async fn enumerate_images<L: PodLister>(
    lister: &L,
    scope: &PodScope,
    options: &EnumerateOptions,
) -> Result<Vec<String>, ClusterError> {
    let pods = list_with_retry(lister, scope, options).await?;
    let images = collect_images(&pods, scope);

    debug!(
        context = %lister.context().name,
        pods = pods.len(),
        images = images.len(),
        "Enumerated images"
    );

    Ok(images)
}

async fn list_with_retry<L: PodLister>(
    lister: &L,
    scope: &PodScope,
    options: &EnumerateOptions,
) -> Result<Vec<Pod>, ClusterError> {
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(options.timeout, lister.list_pods(scope)).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Connectivity(format!(
                "no response within {:?}",
                options.timeout
            ))),
        };

        match result {
            Ok(pods) => return Ok(pods),
            Err(e) if e.is_retryable() && attempt < options.retry.attempts => {
                let delay = options.retry.delay_after(attempt);
                warn!(
                    context = %lister.context().name,
                    attempt,
                    "Listing pods failed ({}), retrying in {:?}",
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Extract the distinct image specs of live pods inside `scope`
pub fn collect_images(pods: &[Pod], scope: &PodScope) -> Vec<String> {
    let mut images = BTreeSet::new();

    for pod in pods {
        let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
        if !scope.includes(namespace) || is_terminated(pod) {
            continue;
        }

        let Some(spec) = &pod.spec else {
            continue;
        };

        let containers = spec
            .containers
            .iter()
            .chain(spec.init_containers.iter().flatten());

        for container in containers {
            if let Some(image) = container.image.as_deref().filter(|i| !i.is_empty()) {
                images.insert(image.to_string());
            }
        }
    }

    images.into_iter().collect()
}

/// Completed pods no longer reflect images in use
fn is_terminated(pod: &Pod) -> bool {
    matches!(
        pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        Some("Succeeded") | Some("Failed")
    )
}
