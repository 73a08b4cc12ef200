use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use community_images_k8s::{KubeClient, KubeOptions, resolve_contexts};
use community_images_report::{ReportDriver, renderer_for};

mod cli;
mod config;
mod progress;

use cli::Args;
use progress::StderrProgress;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr, the report owns stdout
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.verbose, &rust_log))
        .with_writer(io::stderr)
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `-v` picks the default level; any directive in RUST_LOG replaces it
fn log_filter(verbose: u8, rust_log: &str) -> EnvFilter {
    let default_level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy(rust_log)
}

async fn run(args: Args) -> Result<ExitCode> {
    if args.no_color {
        crossterm::style::force_color_output(false);
    }

    let file = args.config.as_deref().map(|path| config::load_config(path)).transpose()?;
    let run_config = config::build_run_configuration(&args, file)?;

    let kube_client = KubeClient::new(KubeOptions {
        kubeconfig: args.kubeconfig.clone(),
        cluster: args.cluster.clone(),
        user: args.user.clone(),
        request_timeout: Some(run_config.enumerate.timeout),
    })?;

    let contexts = resolve_contexts(&run_config.contexts, Some(&kube_client))?;
    info!(?contexts, "Searching for images");

    let mut renderer = renderer_for(
        run_config.output,
        io::stdout(),
        run_config.only_deprecated,
    );

    let report = ReportDriver::new(&kube_client, &run_config)
        .with_progress(StderrProgress::new())
        .run(&contexts, renderer.as_mut())
        .await?;

    Ok(ExitCode::from(report.exit_code()))
}
