mod cli;
mod config;
mod error;
mod logging;
mod progress;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

use atd_engine::{
    CancellationToken, Downloader, EpisodeSelector, ItemReport, OrchestratorConfig, WorkItem,
};

use crate::cli::{Args, Commands};
use crate::config::AppConfig;
use crate::error::Result;
use crate::logging::init_logging;
use crate::progress::ProgressRenderer;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) if e.is_cancelled() => {
            info!("Interrupted");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Application error: {}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let renderer = ProgressRenderer::new(!args.quiet);
    let _log_guard = init_logging(
        args.verbose,
        args.quiet,
        args.log_dir.as_deref(),
        renderer.multi(),
    )?;

    let config = AppConfig::load(args.config.as_deref())?;
    debug!(?config, "Loaded configuration");

    // Parse the episode expression before any network activity.
    let (work, item_concurrency) = match &args.command {
        Commands::Movie { url, .. } | Commands::Episode { url, .. } => (
            WorkItem::Single {
                page_url: url.clone(),
            },
            1,
        ),
        Commands::Series {
            url,
            episodes,
            processes,
            ..
        } => {
            let selector = match episodes {
                Some(expr) => EpisodeSelector::parse(expr)?,
                None => EpisodeSelector::all(),
            };
            (
                WorkItem::Series {
                    listing_url: url.clone(),
                    selector,
                },
                processes.map(usize::from).unwrap_or(config.processes),
            )
        }
    };

    let options = args.command.options();
    let orchestrator_config = OrchestratorConfig {
        output_dir: config.output_dir(args.command.dir().map(PathBuf::as_path)),
        segment_concurrency: options.segments.map(usize::from).unwrap_or(config.segments),
        transcode: options.ffmpeg || config.ffmpeg,
        ..OrchestratorConfig::default()
    };
    info!(
        output_dir = %orchestrator_config.output_dir.display(),
        segments = orchestrator_config.segment_concurrency,
        processes = item_concurrency,
        ffmpeg = orchestrator_config.transcode,
        "Starting"
    );

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping downloads");
            signal_token.cancel();
        }
    });

    let downloader = Downloader::new(
        orchestrator_config,
        &config.downloader_config(),
        config.remux_config(),
        token,
    )?
    .with_progress(renderer.callback());

    let result = downloader.run(&work, item_concurrency).await;
    renderer.clear();
    let mut reports = result?;

    reports.sort_by_key(|r| r.ordinal);
    print_summary(&work, &reports);

    Ok(if has_failures(&reports) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_summary(work: &WorkItem, reports: &[ItemReport]) {
    match work {
        WorkItem::Single { .. } => {
            for report in reports {
                println!("{}", report.outcome);
            }
        }
        WorkItem::Series { .. } => {
            if reports.is_empty() {
                println!("No episodes selected");
                return;
            }
            for report in reports {
                println!("{:>4}  {}  {}", report.ordinal, report.page_url, report.outcome);
            }
            let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
            println!("{} episodes, {failed} failed", reports.len());
        }
    }
}

/// Failures other than a user interrupt make the run unsuccessful.
fn has_failures(reports: &[ItemReport]) -> bool {
    reports
        .iter()
        .any(|r| r.outcome.is_failed() && !r.outcome.is_cancelled())
}
