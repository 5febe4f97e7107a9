//! KernelCI fstests runner - Main entry point.
//!
//! Runs fstests jobs and reports the results to the KernelCI API.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use fstests_lib::cli::{Cli, Command, RunArgs};
use fstests_lib::config::Config;
use fstests_lib::error::AppResult;
use fstests_lib::services::{
    CheckoutListener, FstestsJob, KernelCiClient, ProcessRunner, ResultsSink, StorageUploader,
    load_report,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV, when set, must be 'development' or 'production'");
            error!("  - FSTESTS_SSH_HOST needs FSTESTS_SSH_USER and FSTESTS_SSH_KEY");
            error!("  - In production, KCI_API_URL and API_TOKEN must be set");
            error!("  - In production, values must not match development defaults");
            return ExitCode::FAILURE;
        }
    };

    info!("========================================");
    info!("  KernelCI fstests runner");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let result = match cli.command {
        Command::Run { node_id, args } => run(&config, node_id.as_deref(), &args).await,
        Command::Listen { max_jobs, args } => listen(&config, max_jobs, &args).await,
        Command::Submit { node_id, report } => submit(&config, &node_id, &report).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_job(config: &Config, args: &RunArgs) -> AppResult<FstestsJob> {
    let mut job = FstestsJob::new(args.output_dir(config), args.pipeline_config(config));
    if let Some(ssh) = args.ssh_settings(config.ssh.as_ref())? {
        info!("Uploading artifacts to {}@{}", ssh.user, ssh.host);
        job = job.with_uploader(StorageUploader::new(ssh, Arc::new(ProcessRunner::new())));
    }
    Ok(job)
}

/// Run one job; `Ok(false)` when a pipeline stage failed.
async fn run(config: &Config, node_id: Option<&str>, args: &RunArgs) -> AppResult<bool> {
    let job = build_job(config, args)?;
    let report = match node_id {
        Some(node_id) => {
            let client = KernelCiClient::new(&config.api)?;
            job.with_sink(Arc::new(client)).run(node_id).await?
        }
        None => {
            info!("No --node-id given, results stay local");
            job.run_local().await?
        }
    };

    info!("Workspace: {}", report.workspace.display());
    Ok(report.outcome.is_success())
}

/// Run a job per available checkout until Ctrl-C or `max_jobs`.
async fn listen(config: &Config, max_jobs: Option<usize>, args: &RunArgs) -> AppResult<bool> {
    args.pipeline_config(config).validate()?;
    let sink: Arc<dyn ResultsSink> = Arc::new(KernelCiClient::new(&config.api)?);
    let job = build_job(config, args)?.with_sink(Arc::clone(&sink));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot wait for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let started = CheckoutListener::new(sink)
        .with_max_jobs(max_jobs)
        .run(&job, shutdown)
        .await?;
    info!("Stopped listening after {} job(s)", started);
    Ok(true)
}

async fn submit(config: &Config, node_id: &str, path: &std::path::Path) -> AppResult<bool> {
    let report = load_report(path).await?;
    let client = KernelCiClient::new(&config.api)?;
    client.submit_results(node_id, &report).await?;
    info!("Submitted {} to node {}", path.display(), node_id);
    Ok(true)
}
