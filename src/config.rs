use std::collections::BTreeSet;
use std::time::Duration;
use std::{env, fs, path::Path};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use community_images_report::{Classifier, RegistryMatcher, RunConfiguration};

use crate::cli::Args;

/// Optional TOML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub contexts: Vec<String>,

    #[serde(default)]
    pub ignore_namespaces: Vec<String>,

    #[serde(default)]
    pub only_red_line: bool,

    pub timeout_secs: Option<u64>,

    pub concurrency: Option<usize>,

    pub retry: Option<RetryConfig>,

    /// Replaces the built-in registry list when non-empty
    #[serde(default)]
    pub deprecated_registries: Vec<RegistryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
}

/// A deprecated registry, given either as a prefix or a regex
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RegistryEntry {
    Prefix { prefix: String },
    Pattern { pattern: String },
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    info!("Loading config from file {}", path.as_ref().display());
    let toml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&toml_str)?;

    let config = toml::from_str(&expanded)
        .context("Failed to parse TOML config after environment variable expansion")?;

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variable values.
/// Returns an error naming the first missing variable.
fn expand_env_vars(input: &str) -> Result<String> {
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    if let Some(var_name) = missing {
        bail!("Missing environment variable: {}", var_name);
    }

    Ok(result.into_owned())
}

/// Merge defaults, the config file and command line into one immutable configuration.
/// Command line (and OUTDATED_* env) values win; lists replace rather than merge.
pub fn build_run_configuration(args: &Args, file: Option<FileConfig>) -> Result<RunConfiguration> {
    let file = file.unwrap_or_default();
    let mut config = RunConfiguration::default();

    config.contexts = if args.contexts.is_empty() {
        file.contexts
    } else {
        args.contexts.clone()
    };

    let ignored = if args.ignore_ns.is_empty() {
        file.ignore_namespaces
    } else {
        args.ignore_ns.clone()
    };
    config.ignored_namespaces = ignored
        .into_iter()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .collect::<BTreeSet<_>>();

    config.namespace = args.namespace.clone();
    config.only_deprecated = args.only_red_line.unwrap_or(file.only_red_line);
    config.output = args.output;

    if !file.deprecated_registries.is_empty() {
        config.classifier = build_classifier(file.deprecated_registries)?;
    }

    if let Some(secs) = args.timeout.or(file.timeout_secs) {
        if secs == 0 {
            bail!("timeout must be at least one second");
        }
        config.enumerate.timeout = Duration::from_secs(secs);
    }

    if let Some(retry) = file.retry {
        if let Some(attempts) = retry.attempts {
            if attempts == 0 {
                bail!("retry.attempts must be at least 1");
            }
            config.enumerate.retry.attempts = attempts;
        }
        if let Some(backoff_ms) = retry.backoff_ms {
            config.enumerate.retry.backoff = Duration::from_millis(backoff_ms);
        }
    }

    if let Some(concurrency) = args.concurrency.or(file.concurrency) {
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        config.concurrency = concurrency;
    }

    Ok(config)
}

fn build_classifier(entries: Vec<RegistryEntry>) -> Result<Classifier> {
    let matchers = entries
        .into_iter()
        .map(|entry| match entry {
            RegistryEntry::Prefix { prefix } => Ok(RegistryMatcher::prefix(prefix)),
            RegistryEntry::Pattern { pattern } => RegistryMatcher::pattern(&pattern)
                .with_context(|| format!("Invalid deprecated registry pattern: {}", pattern)),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Classifier::new(matchers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use community_images_report::OutputFormat;

    fn args(extra: &[&str]) -> Args {
        let _guard = crate::cli::ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let mut argv = vec!["community-images"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        fs::write(tmp_file.path(), content).expect("Failed to write to temp file");
        tmp_file
    }

    #[test]
    fn test_expand_env_vars_success() {
        unsafe {
            env::set_var("COMMUNITY_IMAGES_TEST_VAR", "value123");
        }
        let expanded = expand_env_vars("ctx = \"${COMMUNITY_IMAGES_TEST_VAR}\"").unwrap();
        assert_eq!(expanded, "ctx = \"value123\"");
        unsafe {
            env::remove_var("COMMUNITY_IMAGES_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_var() {
        let err = expand_env_vars("This will fail: ${COMMUNITY_IMAGES_MISSING_VAR}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: COMMUNITY_IMAGES_MISSING_VAR"
        );
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "No variables here";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_defaults_without_file() {
        let config = build_run_configuration(&args(&[]), None).unwrap();

        assert!(config.contexts.is_empty());
        assert!(config.ignored_namespaces.is_empty());
        assert!(!config.only_deprecated);
        assert_eq!(config.enumerate.timeout, Duration::from_secs(30));
        assert_eq!(config.enumerate.retry.attempts, 2);
        assert_eq!(config.concurrency, 4);
        assert!(config.classifier.is_deprecated("k8s.gcr.io/pause:3.2"));
        assert!(config.classifier.is_deprecated("gcr.io/google-containers/pause:3.2"));
    }

    #[test]
    fn test_load_config_file() {
        let tmp_file = write_config(
            r#"
            contexts = ["prod", "staging"]
            ignore_namespaces = ["kube-system"]
            only_red_line = true
            timeout_secs = 10
            concurrency = 2

            [retry]
            attempts = 3
            backoff_ms = 250

            [[deprecated_registries]]
            prefix = "k8s.gcr.io/"

            [[deprecated_registries]]
            pattern = '^eu\.gcr\.io/k8s-artifacts-prod/'
            "#,
        );

        let file = load_config(tmp_file.path()).expect("Should load config");
        let config = build_run_configuration(&args(&[]), Some(file)).unwrap();

        assert_eq!(config.contexts, vec!["prod", "staging"]);
        assert!(config.ignored_namespaces.contains("kube-system"));
        assert!(config.only_deprecated);
        assert_eq!(config.enumerate.timeout, Duration::from_secs(10));
        assert_eq!(config.enumerate.retry.attempts, 3);
        assert_eq!(config.enumerate.retry.backoff, Duration::from_millis(250));
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.classifier.matchers().len(), 2);
        assert!(config.classifier.is_deprecated("eu.gcr.io/k8s-artifacts-prod/pause:3.2"));
        assert!(!config.classifier.is_deprecated("gcr.io/google-containers/pause:3.2"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            contexts: vec!["from-file".to_string()],
            ignore_namespaces: vec!["file-ns".to_string()],
            timeout_secs: Some(10),
            ..Default::default()
        };
        let cli = args(&[
            "--contexts",
            "from-cli",
            "--ignore-ns",
            "cli-ns",
            "--timeout",
            "5",
            "--output",
            "json",
        ]);

        let config = build_run_configuration(&cli, Some(file)).unwrap();

        assert_eq!(config.contexts, vec!["from-cli"]);
        assert_eq!(
            config.ignored_namespaces,
            BTreeSet::from(["cli-ns".to_string()])
        );
        assert_eq!(config.enumerate.timeout, Duration::from_secs(5));
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn test_only_red_line_from_file_can_be_switched_off() {
        let from_file = || FileConfig {
            only_red_line: true,
            ..Default::default()
        };

        let config = build_run_configuration(&args(&[]), Some(from_file())).unwrap();
        assert!(config.only_deprecated);

        let config =
            build_run_configuration(&args(&["--only-red-line=false"]), Some(from_file())).unwrap();
        assert!(!config.only_deprecated);

        let config = build_run_configuration(&args(&["--only-red-line"]), None).unwrap();
        assert!(config.only_deprecated);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let file = FileConfig {
            deprecated_registries: vec![RegistryEntry::Pattern {
                pattern: "([".to_string(),
            }],
            ..Default::default()
        };

        let err = build_run_configuration(&args(&[]), Some(file)).unwrap_err();
        assert!(err.to_string().contains("Invalid deprecated registry pattern"));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(build_run_configuration(&args(&["--concurrency", "0"]), None).is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let tmp_file = write_config("registries = []");
        assert!(load_config(tmp_file.path()).is_err());
    }
}
