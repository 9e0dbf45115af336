use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use family_connect::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use family_connect::config::{load_profiles, resolve_runtime_config};
use family_connect::doctor::run_doctor;
use family_connect::error::{categorize_error, format_cli_error};
use family_connect::profiles::{run_profiles_list, run_profiles_show};
use family_connect::runner::{run_monitor, run_pipeline_once, run_today};
use family_connect::server::run_server;
use family_connect::telemetry::{TelemetrySink, run_telemetry_report};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;

    // No subcommand behaves like a one-shot run for today.
    let command = cli.command.unwrap_or(Commands::Run { date: None });
    let label = command_label(&command);
    let telemetry = TelemetrySink::new(&cfg, label.clone());
    let started_at = Instant::now();
    tracing::debug!(command = %label, profile = %cfg.profile, "dispatching command");

    let result = match command {
        Commands::Run { date } => run_pipeline_once(&cfg, date.as_deref(), &telemetry)
            .await
            .map(|_| ()),
        Commands::Monitor { interval_secs } => run_monitor(&cfg, interval_secs, &telemetry)
            .await
            .map(|_| ()),
        Commands::Today { date } => run_today(&cfg, date.as_deref()),
        Commands::Serve { host, port } => run_server(cfg.clone(), host, port, &telemetry).await,
        Commands::Doctor => run_doctor(&cfg),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg),
            ProfileCommands::Show => run_profiles_show(&cfg),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(&cfg, path, limit),
        },
    };

    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(()) => telemetry.emit("command.completed", json!({ "duration_ms": duration_ms })),
        Err(err) => telemetry.emit(
            "command.failed",
            json!({
                "duration_ms": duration_ms,
                "category": categorize_error(err).code(),
            }),
        ),
    }

    result
}
