use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use chrono::Utc;
use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use community_images_types::ErrorKind;

use crate::driver::{ContextOutcome, ContextReport, RunReport};
use crate::normalize::ImageReference;

/// Output flavour selected on the command line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colorized, human-readable lines plus an explanatory trailer
    #[default]
    Text,
    /// One JSON record per line
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Writes context reports as they complete, then a closing block
pub trait Renderer {
    fn render_context(&mut self, report: &ContextReport) -> io::Result<()>;

    fn finish(&mut self, run: &RunReport) -> io::Result<()>;
}

/// Build the renderer for `format` writing to `out`
pub fn renderer_for<'a, W: Write + 'a>(
    format: OutputFormat,
    out: W,
    only_deprecated: bool,
) -> Box<dyn Renderer + 'a> {
    match format {
        OutputFormat::Text => Box::new(TextRenderer::new(out, only_deprecated)),
        OutputFormat::Json => Box::new(JsonRenderer::new(out, only_deprecated)),
    }
}

// ============================================================================
// Text
// ============================================================================

pub struct TextRenderer<W> {
    out: W,
    only_deprecated: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, only_deprecated: bool) -> Self {
        Self {
            out,
            only_deprecated,
        }
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render_context(&mut self, report: &ContextReport) -> io::Result<()> {
        let header = match &report.host {
            Some(host) => format!("Context: {} ({})", report.context, host),
            None => format!("Context: {}", report.context),
        };
        writeln!(self.out, "{}", header.as_str().bold())?;
        writeln!(self.out, "{}", "─".repeat(header.width()))?;

        match &report.outcome {
            ContextOutcome::Images(images) if images.is_empty() => {
                writeln!(self.out, "  {}", "no running images found".dark_grey())?;
            }
            ContextOutcome::Images(images) => {
                for result in images {
                    if result.deprecated {
                        writeln!(self.out, "  {} {}", "❌".red(), result.image.as_str().red())?;
                    } else if !self.only_deprecated {
                        writeln!(
                            self.out,
                            "  {} {}",
                            "✅".green(),
                            result.image.as_str().green()
                        )?;
                    }
                }
            }
            ContextOutcome::Failed(e) => {
                writeln!(self.out, "  {} {}", "error:".red().bold(), e)?;
            }
        }

        writeln!(self.out)?;
        self.out.flush()
    }

    fn finish(&mut self, _run: &RunReport) -> io::Result<()> {
        let out = &mut self.out;

        writeln!(
            out,
            "Images in {} are being pulled from {} Kubernetes community registries.",
            "red ❌".red(),
            "*outdated*".bold()
        )?;
        writeln!(
            out,
            "The others marked in {} are good as they do not use the outdated registries.",
            "green ✅".green()
        )?;
        writeln!(
            out,
            "Please copy these images to your own registry and change your manifest(s)"
        )?;
        writeln!(out, "to point to the new location.")?;
        writeln!(out)?;
        writeln!(
            out,
            "If you are unable to do so, as a short term fix please use {}",
            "`registry.k8s.io`".green()
        )?;
        writeln!(
            out,
            "instead of {} until you have your own registry.",
            "`k8s.gcr.io`".red()
        )?;
        writeln!(out)?;
        writeln!(
            out,
            "This simple change on your part will help the Kubernetes community immensely as it"
        )?;
        writeln!(out, "reduces the cost of us serving these container images.")?;
        writeln!(out)?;
        writeln!(
            out,
            "{}",
            "Why you should do this as soon as possible? Read more in the following blog".bold()
        )?;
        writeln!(out, "{}", "posts by the Kubernetes community:".bold())?;
        writeln!(
            out,
            "- https://kubernetes.io/blog/2022/11/28/registry-k8s-io-faster-cheaper-ga/"
        )?;
        writeln!(
            out,
            "- https://kubernetes.io/blog/2023/02/06/k8s-gcr-io-freeze-announcement/"
        )?;
        out.flush()
    }
}

// ============================================================================
// JSON lines
// ============================================================================

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Image {
        context: &'a str,
        image: &'a str,
        deprecated: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        registry: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        digest: Option<String>,
    },
    Error {
        context: &'a str,
        kind: ErrorKind,
        message: String,
    },
    Summary {
        contexts: usize,
        failed: usize,
        deprecated_images: usize,
        generated_at: String,
    },
}

pub struct JsonRenderer<W> {
    out: W,
    only_deprecated: bool,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W, only_deprecated: bool) -> Self {
        Self {
            out,
            only_deprecated,
        }
    }

    fn write_record(&mut self, record: &Record<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        writeln!(self.out)
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn render_context(&mut self, report: &ContextReport) -> io::Result<()> {
        match &report.outcome {
            ContextOutcome::Images(images) => {
                for result in images {
                    if self.only_deprecated && !result.deprecated {
                        continue;
                    }
                    let reference = ImageReference::parse(&result.image).ok();
                    let (registry, tag, digest) = match reference {
                        Some(r) => (r.registry, r.tag, r.digest),
                        None => (None, None, None),
                    };
                    self.write_record(&Record::Image {
                        context: &report.context,
                        image: &result.image,
                        deprecated: result.deprecated,
                        registry,
                        tag,
                        digest,
                    })?;
                }
            }
            ContextOutcome::Failed(e) => {
                self.write_record(&Record::Error {
                    context: &report.context,
                    kind: e.kind(),
                    message: e.to_string(),
                })?;
            }
        }
        self.out.flush()
    }

    fn finish(&mut self, run: &RunReport) -> io::Result<()> {
        self.write_record(&Record::Summary {
            contexts: run.contexts.len(),
            failed: run.failed_count(),
            deprecated_images: run.deprecated_count(),
            generated_at: Utc::now().to_rfc3339(),
        })?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use community_images_types::{ClassificationResult, ClusterError};
    use serde_json::Value;

    fn healthy_report() -> ContextReport {
        ContextReport {
            context: "prod".to_string(),
            host: Some("https://10.0.0.1:6443".to_string()),
            outcome: ContextOutcome::Images(vec![
                ClassificationResult::new("k8s.gcr.io/pause:3.2".to_string(), true),
                ClassificationResult::new("registry.k8s.io/pause:3.9".to_string(), false),
            ]),
        }
    }

    fn failed_report() -> ContextReport {
        ContextReport {
            context: "staging".to_string(),
            host: None,
            outcome: ContextOutcome::Failed(ClusterError::Connectivity(
                "connection refused".to_string(),
            )),
        }
    }

    fn render(format: OutputFormat, only_deprecated: bool, reports: Vec<ContextReport>) -> String {
        let mut out = Vec::new();
        {
            let mut renderer = renderer_for(format, &mut out, only_deprecated);
            for report in &reports {
                renderer.render_context(report).unwrap();
            }
            renderer.finish(&RunReport { contexts: reports }).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TEXT".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_text_lists_both_kinds_and_trailer() {
        let text = render(OutputFormat::Text, false, vec![healthy_report()]);
        assert!(text.contains("Context: prod (https://10.0.0.1:6443)"));
        assert!(text.contains("k8s.gcr.io/pause:3.2"));
        assert!(text.contains("registry.k8s.io/pause:3.9"));
        assert!(text.contains("k8s-gcr-io-freeze-announcement"));
    }

    #[test]
    fn test_text_only_deprecated() {
        let text = render(OutputFormat::Text, true, vec![healthy_report()]);
        assert!(text.contains("k8s.gcr.io/pause:3.2"));
        assert!(!text.contains("registry.k8s.io/pause:3.9"));
    }

    #[test]
    fn test_text_failed_context() {
        let text = render(OutputFormat::Text, false, vec![failed_report()]);
        assert!(text.contains("Context: staging"));
        assert!(text.contains("cluster unreachable: connection refused"));
    }

    #[test]
    fn test_json_records() {
        let json = render(
            OutputFormat::Json,
            false,
            vec![healthy_report(), failed_report()],
        );
        let records: Vec<Value> = json
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["type"], "image");
        assert_eq!(records[0]["context"], "prod");
        assert_eq!(records[0]["deprecated"], true);
        assert_eq!(records[0]["registry"], "k8s.gcr.io");
        assert_eq!(records[0]["tag"], "3.2");
        assert_eq!(records[1]["deprecated"], false);
        assert_eq!(records[2]["type"], "error");
        assert_eq!(records[2]["kind"], "connectivity");
        assert_eq!(records[3]["type"], "summary");
        assert_eq!(records[3]["contexts"], 2);
        assert_eq!(records[3]["failed"], 1);
        assert_eq!(records[3]["deprecated_images"], 1);
    }

    #[test]
    fn test_json_only_deprecated_has_no_trailer() {
        let json = render(OutputFormat::Json, true, vec![healthy_report()]);
        assert_eq!(json.lines().count(), 2);
        assert!(!json.contains("kubernetes.io/blog"));
    }
}
