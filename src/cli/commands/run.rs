//! Batch lookup command.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;

use crate::cli::progress::RunProgress;
use crate::config::{ConfigError, Settings};
use crate::export::{summarize, write_results};
use crate::input::{load_keys_from_path, parse_key_text};
use crate::models::{normalize_keys, Completion, InputKey};
use crate::scrapers::HttpClient;
use crate::work_queue::RunCoordinator;

/// Options of the `run` subcommand.
pub struct RunArgs {
    pub keys: Option<String>,
    pub file: Option<PathBuf>,
    pub session: Option<String>,
    pub workers: Option<usize>,
    pub delay: Option<f64>,
    pub nic: Option<String>,
    pub contact: Option<String>,
    pub output_dir: Option<PathBuf>,
}

/// Number of successful records echoed after a run.
const SAMPLE_SIZE: usize = 5;

pub async fn cmd_run(settings: &Settings, args: RunArgs) -> anyhow::Result<()> {
    let keys = collect_keys(args.keys.as_deref(), args.file.as_deref())?;
    if keys.is_empty() {
        println!("{} No vehicle numbers provided", style("!").yellow());
        return Err(ConfigError::NoKeys.into());
    }

    let Some(session) = args.session.as_deref().or(settings.session_id.as_deref()) else {
        return Err(ConfigError::MissingSession.into());
    };
    let config = settings.fetch_config(
        args.workers,
        args.delay,
        args.nic.as_deref(),
        args.contact.as_deref(),
        session,
    )?;
    let fetcher = Arc::new(HttpClient::new(settings)?);
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| settings.results_dir.clone());

    let total = keys.len();
    println!(
        "{} Looking up {} vehicles with {} workers ({:.1}s delay)",
        style("→").cyan(),
        total,
        config.concurrency(),
        config.delay().as_secs_f64()
    );

    let coordinator = RunCoordinator::new();
    let mut progress_rx = coordinator.subscribe();
    let handle = coordinator.start(keys, config, fetcher).await?;

    let display = Arc::new(RunProgress::new(total));

    // Progress display (UI layer)
    let display_clone = display.clone();
    let progress_task = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let snapshot = progress_rx.borrow_and_update().clone();
            display_clone.update(&snapshot);
            if snapshot.is_terminal() {
                break;
            }
        }
    });

    // Ctrl-C stops dispatching; in-flight lookups drain.
    let stopper = coordinator.clone();
    let display_clone = display.clone();
    let interrupt_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && stopper.request_stop().await {
            display_clone.println(&format!(
                "{} Stopping after in-flight lookups finish...",
                style("!").yellow()
            ));
        }
    });

    let outcome = coordinator.wait(handle).await;
    interrupt_task.abort();
    if let Err(e) = progress_task.await {
        tracing::warn!("Progress display task failed: {}", e);
    }
    display.finish();

    match &outcome.completion {
        Completion::Finished => {}
        Completion::Cancelled => println!(
            "{} Cancelled after {}/{} vehicles",
            style("!").yellow(),
            outcome.records.len(),
            outcome.total
        ),
        Completion::Aborted(reason) => {
            println!("{} Run aborted: {}", style("✗").red(), reason)
        }
    }

    let records = outcome.records;
    let files = tokio::task::spawn_blocking({
        let records = records.clone();
        move || write_results(&output_dir, &records)
    })
    .await??;

    let summary = summarize(&records);
    println!(
        "{} Processed {} vehicles: {} successful, {} failed ({:.1}% success)",
        style("✓").green(),
        summary.total,
        summary.successful,
        summary.failed,
        summary.success_rate
    );
    println!("  {} CSV:  {}", style("→").dim(), files.csv.display());
    println!("  {} JSON: {}", style("→").dim(), files.json.display());

    let samples: Vec<_> = records
        .iter()
        .filter(|r| r.is_success())
        .take(SAMPLE_SIZE)
        .collect();
    if !samples.is_empty() {
        println!("\nSample results:");
        for r in samples {
            println!(
                "  {} {} | {} {} ({}) | {}",
                style("•").dim(),
                style(&r.vehicle_number).bold(),
                r.make,
                r.model,
                r.year_of_manufacture,
                r.vehicle_class
            );
        }
    }

    for r in records.iter().filter(|r| !r.is_success()) {
        tracing::debug!(
            "{} {}: {}",
            r.vehicle_number,
            r.status.as_str(),
            r.error.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

/// Merge keys from `--keys` text and `--file`, normalized and deduplicated.
fn collect_keys(text: Option<&str>, file: Option<&std::path::Path>) -> anyhow::Result<Vec<InputKey>> {
    let mut keys = text.map(parse_key_text).unwrap_or_default();
    if let Some(path) = file {
        keys.extend(load_keys_from_path(path)?);
    }
    Ok(normalize_keys(keys.iter().map(InputKey::as_str)))
}
