use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use community_images_report::OutputFormat;

/// community-images - find pods pulling from the frozen Kubernetes community registries
///
/// Every flag can also be set through an environment variable with the
/// OUTDATED_ prefix, e.g. --ignore-ns becomes OUTDATED_IGNORE_NS.
#[derive(Parser, Debug)]
#[command(name = "community-images")]
#[command(author, version, about, long_about)]
pub struct Args {
    /// Namespaces to exclude from searching
    #[arg(
        long = "ignore-ns",
        env = "OUTDATED_IGNORE_NS",
        value_name = "NAMESPACE",
        value_delimiter = ','
    )]
    pub ignore_ns: Vec<String>,

    /// Print only images pulled from outdated registries
    #[arg(
        long,
        env = "OUTDATED_ONLY_RED_LINE",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub only_red_line: Option<bool>,

    /// Contexts to search (defaults to the current context)
    #[arg(long, env = "OUTDATED_CONTEXTS", value_name = "CONTEXT", value_delimiter = ',')]
    pub contexts: Vec<String>,

    /// Path to the kubeconfig file
    #[arg(long, env = "OUTDATED_KUBECONFIG", value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Only search this namespace
    #[arg(short, long, env = "OUTDATED_NAMESPACE")]
    pub namespace: Option<String>,

    /// Kubeconfig cluster to use for every context
    #[arg(long, env = "OUTDATED_CLUSTER")]
    pub cluster: Option<String>,

    /// Kubeconfig user to use for every context
    #[arg(long, env = "OUTDATED_USER")]
    pub user: Option<String>,

    /// TOML file with registries, namespaces and limits
    #[arg(short, long, env = "OUTDATED_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format: text or json (one record per line)
    #[arg(short, long, env = "OUTDATED_OUTPUT", default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Seconds to wait for each context before giving up
    #[arg(long, env = "OUTDATED_TIMEOUT", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Number of contexts searched at the same time
    #[arg(long, env = "OUTDATED_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Disable colored output
    #[arg(long, env = "OUTDATED_NO_COLOR", value_parser = BoolishValueParser::new())]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Serializes tests that parse `Args`, since clap reads OUTDATED_* from the process env
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
