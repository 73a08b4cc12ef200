use std::io;

use futures::StreamExt;
use tracing::{info, warn};

use community_images_k8s::{Cluster, PodLister, enumerate_images};
use community_images_types::{ClassificationResult, ClusterError};

use crate::config::RunConfiguration;
use crate::normalize::normalize;
use crate::progress::{NoProgress, Progress};
use crate::render::Renderer;

/// What happened to one context
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextOutcome {
    /// Classified images, in enumeration order
    Images(Vec<ClassificationResult>),
    Failed(ClusterError),
}

/// Buffered result for a single context, rendered as one block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextReport {
    pub context: String,

    /// API endpoint, known once a client was built
    pub host: Option<String>,

    pub outcome: ContextOutcome,
}

impl ContextReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ContextOutcome::Failed(_))
    }

    /// Classified images (empty for failed contexts)
    pub fn images(&self) -> &[ClassificationResult] {
        match &self.outcome {
            ContextOutcome::Images(images) => images,
            ContextOutcome::Failed(_) => &[],
        }
    }

    pub fn deprecated_count(&self) -> usize {
        self.images().iter().filter(|i| i.deprecated).count()
    }
}

/// Aggregated outcome of a whole run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub contexts: Vec<ContextReport>,
}

impl RunReport {
    /// True when every context was enumerated
    pub fn success(&self) -> bool {
        !self.contexts.iter().any(ContextReport::is_failed)
    }

    pub fn failed_count(&self) -> usize {
        self.contexts.iter().filter(|c| c.is_failed()).count()
    }

    pub fn deprecated_count(&self) -> usize {
        self.contexts.iter().map(ContextReport::deprecated_count).sum()
    }

    /// 0 if all contexts succeeded, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.success() { 0 } else { 1 }
    }
}

/// Walks the context list: connect, enumerate, classify, render
pub struct ReportDriver<'a, C, P = NoProgress> {
    cluster: &'a C,
    config: &'a RunConfiguration,
    progress: P,
}

impl<'a, C: Cluster> ReportDriver<'a, C> {
    pub fn new(cluster: &'a C, config: &'a RunConfiguration) -> Self {
        Self {
            cluster,
            config,
            progress: NoProgress,
        }
    }
}

impl<'a, C: Cluster, P: Progress> ReportDriver<'a, C, P> {
    /// Replace the progress sink
    pub fn with_progress<Q: Progress>(self, progress: Q) -> ReportDriver<'a, C, Q> {
        ReportDriver {
            cluster: self.cluster,
            config: self.config,
            progress,
        }
    }

    /// Process every context and render each report as soon as it is next in order.
    ///
    /// A failing context never stops the run; the aggregate is returned once all
    /// contexts are done and the renderer has written its summary.
    pub async fn run<R>(&self, contexts: &[String], renderer: &mut R) -> io::Result<RunReport>
    where
        R: Renderer + ?Sized,
    {
        let mut reports = futures::stream::iter(contexts)
            .map(|context| self.process_context(context))
            .buffered(self.config.concurrency.max(1));

        let mut run = RunReport::default();
        while let Some(report) = reports.next().await {
            self.progress.context_finished(&report);
            renderer.render_context(&report)?;
            run.contexts.push(report);
        }

        info!(
            contexts = run.contexts.len(),
            failed = run.failed_count(),
            deprecated = run.deprecated_count(),
            "Run finished"
        );

        renderer.finish(&run)?;
        Ok(run)
    }

    async fn process_context(&self, context: &str) -> ContextReport {
        self.progress.context_started(context);

        let (host, outcome) = match self.connect(context).await {
            Ok(connection) => {
                let host = connection.context().host.clone();
                let scope = self.config.pod_scope();
                let outcome =
                    match enumerate_images(&connection, &scope, &self.config.enumerate).await {
                        Ok(images) => ContextOutcome::Images(self.classify(images)),
                        Err(e) => ContextOutcome::Failed(e),
                    };
                (Some(host), outcome)
            }
            Err(e) => (None, ContextOutcome::Failed(e)),
        };

        if let ContextOutcome::Failed(e) = &outcome {
            warn!(context, "Context failed: {}", e);
        }

        ContextReport {
            context: context.to_string(),
            host,
            outcome,
        }
    }

    /// Building a client can run exec credential plugins, so it is bounded too
    async fn connect(&self, context: &str) -> Result<C::Connection, ClusterError> {
        let timeout = self.config.enumerate.timeout;
        match tokio::time::timeout(timeout, self.cluster.connect(context)).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::Connectivity(format!(
                "could not build a client within {:?}",
                timeout
            ))),
        }
    }

    fn classify(&self, images: Vec<String>) -> Vec<ClassificationResult> {
        images
            .iter()
            .map(|raw| self.config.classifier.classify(normalize(raw)))
            .collect()
    }
}
