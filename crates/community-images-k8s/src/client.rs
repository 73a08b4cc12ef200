//! Kubernetes client for community-images

use std::path::PathBuf;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::{debug, info};

use community_images_types::{ClusterError, ContextInfo};

use crate::enumerate::{Cluster, PodLister, PodScope};
use crate::resolver::KubeconfigSource;

/// Pods fetched per list request
const PAGE_SIZE: u32 = 500;

/// Connection flags shared by every context
#[derive(Clone, Debug, Default)]
pub struct KubeOptions {
    /// Explicit kubeconfig path (defaults to KUBECONFIG or ~/.kube/config)
    pub kubeconfig: Option<PathBuf>,

    /// Override the cluster referenced by each context
    pub cluster: Option<String>,

    /// Override the user (auth info) referenced by each context
    pub user: Option<String>,

    /// Connect/read timeout for individual HTTP requests
    pub request_timeout: Option<Duration>,
}

/// Kubernetes client wrapper
pub struct KubeClient {
    kubeconfig: Kubeconfig,
    options: KubeOptions,
}

impl KubeClient {
    /// Create a new KubeClient by loading the kubeconfig
    pub fn new(options: KubeOptions) -> Result<Self, ClusterError> {
        let kubeconfig = match &options.kubeconfig {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        }
        .map_err(|e| {
            ClusterError::Config(format!("failed to read kubeconfig ({e}). Is kubectl configured?"))
        })?;

        Ok(Self::from_kubeconfig(kubeconfig, options))
    }

    /// Wrap an already loaded kubeconfig
    pub fn from_kubeconfig(kubeconfig: Kubeconfig, options: KubeOptions) -> Self {
        Self {
            kubeconfig,
            options,
        }
    }

    /// Cluster and user names a context refers to, with overrides applied
    fn describe_context(&self, context_name: &str) -> (String, String) {
        let context = self
            .kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .and_then(|c| c.context.as_ref());

        let cluster = self
            .options
            .cluster
            .clone()
            .or_else(|| context.map(|c| c.cluster.clone()))
            .unwrap_or_default();
        let user = self
            .options
            .user
            .clone()
            .or_else(|| context.and_then(|c| c.user.clone()))
            .unwrap_or_default();

        (cluster, user)
    }
}

impl KubeconfigSource for KubeClient {
    fn current_context(&self) -> Option<String> {
        self.kubeconfig.current_context.clone()
    }
}

impl Cluster for KubeClient {
    type Connection = ContextClient;

    /// Create a kube::Client for a specific context
    async fn connect(&self, context_name: &str) -> Result<ContextClient, ClusterError> {
        let mut config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: Some(context_name.to_string()),
                cluster: self.options.cluster.clone(),
                user: self.options.user.clone(),
            },
        )
        .await
        .map_err(|e| {
            ClusterError::Config(format!(
                "failed to create config for context {}: {}",
                context_name, e
            ))
        })?;

        if let Some(timeout) = self.options.request_timeout {
            config.connect_timeout = Some(timeout);
            config.read_timeout = Some(timeout);
        }

        let host = config.cluster_url.to_string();
        let host = host.trim_end_matches('/').to_string();
        let (cluster, user) = self.describe_context(context_name);

        let client = kube::Client::try_from(config).map_err(classify_kube_error)?;
        info!(context = context_name, %cluster, %user, %host, "Connected client");

        Ok(ContextClient {
            client,
            info: ContextInfo::new(context_name.to_string(), host),
        })
    }
}

/// A client bound to a single context
pub struct ContextClient {
    client: kube::Client,
    info: ContextInfo,
}

impl PodLister for ContextClient {
    fn context(&self) -> &ContextInfo {
        &self.info
    }

    /// Fetch all pods in scope, following pagination
    async fn list_pods(&self, scope: &PodScope) -> Result<Vec<Pod>, ClusterError> {
        let pods: Api<Pod> = match &scope.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        let mut params = ListParams::default().limit(PAGE_SIZE);
        if let Some(selector) = scope.field_selector() {
            params = params.fields(&selector);
        }

        let mut items = Vec::new();
        loop {
            let page = pods.list(&params).await.map_err(classify_kube_error)?;
            debug!(
                context = %self.info.name,
                count = page.items.len(),
                "Fetched page of pods"
            );
            items.extend(page.items);

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => params = params.continue_token(&token),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Map a kube client error onto the cluster error taxonomy
pub fn classify_kube_error(err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) => match response.code {
            401 => ClusterError::Auth(response.message),
            403 => ClusterError::Permission(response.message),
            code => ClusterError::Api {
                code,
                message: response.message,
            },
        },
        kube::Error::Auth(e) => ClusterError::Auth(e.to_string()),
        kube::Error::InferConfig(e) => ClusterError::Config(e.to_string()),
        other => ClusterError::Connectivity(other.to_string()),
    }
}
