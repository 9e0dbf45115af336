use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::agents::memory::{filter_todays, load_event_set};
use crate::agents::orchestrator::{Orchestrator, RunSummary};
use crate::calendar::parse_as_of;
use crate::config::RuntimeConfig;
use crate::llm::GenerationClient;
use crate::provider::build_generation_client;
use crate::report::{render_run_report, render_today};
use crate::server::shutdown_signal;
use crate::telemetry::TelemetrySink;

pub fn build_orchestrator_with_client(
    cfg: &RuntimeConfig,
    generation: GenerationClient,
    telemetry: &TelemetrySink,
) -> Orchestrator {
    Orchestrator::wire(cfg.orchestrator_config(), generation, telemetry.clone())
}

/// Fails only on startup configuration: missing key or unsupported model.
pub fn build_orchestrator(cfg: &RuntimeConfig, telemetry: &TelemetrySink) -> Result<Orchestrator> {
    let generation = build_generation_client(cfg, telemetry)?;
    Ok(build_orchestrator_with_client(cfg, generation, telemetry))
}

pub async fn run_pipeline_once(
    cfg: &RuntimeConfig,
    date: Option<&str>,
    telemetry: &TelemetrySink,
) -> Result<RunSummary> {
    let as_of = parse_as_of(date.unwrap_or("today"))?;
    let orchestrator = build_orchestrator(cfg, telemetry)?;

    println!("Starting Family Connect...");
    let summary = orchestrator.run_once(as_of).await;
    print!("{}", render_run_report(&summary, &orchestrator.snapshot()));
    Ok(summary)
}

pub async fn run_monitor(
    cfg: &RuntimeConfig,
    interval_secs: Option<u64>,
    telemetry: &TelemetrySink,
) -> Result<usize> {
    let interval = interval_secs
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| cfg.poll_interval());
    let orchestrator = build_orchestrator(cfg, telemetry)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    println!(
        "Monitoring '{}' every {}s (Ctrl+C to stop)",
        cfg.data_path,
        interval.as_secs()
    );
    let runs = orchestrator.run_forever(interval, cancel).await;
    println!("Monitoring stopped after {runs} run(s).");
    Ok(runs)
}

/// Lists matches straight from the data file; needs no credential.
pub fn run_today(cfg: &RuntimeConfig, date: Option<&str>) -> Result<()> {
    let as_of = parse_as_of(date.unwrap_or("today"))?;
    let set = load_event_set(Path::new(&cfg.data_path));
    if let Some(err) = &set.unavailable {
        println!("Data warning: {err}");
    }
    print!("{}", render_today(as_of, &filter_todays(&set.events, as_of)));
    Ok(())
}
