use community_images_types::ClusterError;
use kube::config::Kubeconfig;

/// Anything that can report the active kubeconfig's current context
pub trait KubeconfigSource {
    fn current_context(&self) -> Option<String>;
}

impl KubeconfigSource for Kubeconfig {
    fn current_context(&self) -> Option<String> {
        self.current_context.clone()
    }
}

/// Determine the ordered list of contexts to process.
///
/// An explicit list wins and is returned verbatim (order and duplicates kept).
/// Otherwise the kubeconfig's current context is used; a missing kubeconfig is
/// a `Config` error and an unset current context is `NoCurrentContext`.
pub fn resolve_contexts<K>(
    explicit: &[String],
    kubeconfig: Option<&K>,
) -> Result<Vec<String>, ClusterError>
where
    K: KubeconfigSource + ?Sized,
{
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }

    let kubeconfig = kubeconfig
        .ok_or_else(|| ClusterError::Config("no kubeconfig available".to_string()))?;

    match kubeconfig.current_context() {
        Some(name) if !name.is_empty() => Ok(vec![name]),
        _ => Err(ClusterError::NoCurrentContext),
    }
}
