use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vidrelay::backend::EcsBackend;
use vidrelay::cli::{Cli, Command};
use vidrelay::config::AppConfig;
use vidrelay::jobs::{JobStatus, JobView, MONITORING_STOPPED};
use vidrelay::ui::{self, JobProgress};
use vidrelay::JobService;

/// How often the CLI re-reads the job while watching it.
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(secs) = cli.poll_interval {
        config.poll_interval_secs = secs;
    }

    match cli.command {
        Command::Check => {
            ui::print_config_check(&config.missing_fields());
            Ok(())
        }
        Command::Submit {
            video_key,
            performance,
        } => {
            let resolved = config.resolve()?;
            let backend = Arc::new(EcsBackend::from_config(&resolved).await);
            let service = JobService::start(config, backend);

            let job_id = service.submit(&video_key, performance.into())?;
            println!("Submitted job {job_id}");

            let view = watch(&service, job_id, &video_key).await?;
            service.shutdown().await;

            if view.status == JobStatus::Failed {
                bail!("job {job_id} failed");
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "vidrelay=debug" } else { "vidrelay=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Stream new log entries until the job is terminal or its monitor gave up.
async fn watch(service: &JobService, job_id: uuid::Uuid, video_key: &str) -> Result<JobView> {
    let progress = JobProgress::start(video_key);
    let mut printed = 0;
    let mut last_status = None;

    loop {
        let view = service.get_job(job_id)?;
        for entry in &view.logs[printed..] {
            progress.log(entry);
        }
        printed = view.logs.len();
        if last_status != Some(view.status) {
            progress.update_status(view.status, video_key);
            last_status = Some(view.status);
        }

        let halted = view
            .logs
            .last()
            .is_some_and(|entry| entry.message == MONITORING_STOPPED);
        if view.status.is_terminal() || halted {
            progress.complete(&view);
            progress.print_view(&view);
            return Ok(view);
        }
        tokio::time::sleep(WATCH_INTERVAL).await;
    }
}
