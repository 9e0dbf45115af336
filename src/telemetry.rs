/// JSONL event log for pipeline runs, and the `telemetry report` reader.
use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::config::RuntimeConfig;

pub fn unix_ms_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Appends one JSON object per event. Every record carries the invocation id
/// and command label so a report can tell `run`, `monitor` and `serve`
/// invocations apart. A sink without a path drops everything.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    path: Option<PathBuf>,
    invocation: String,
    command: String,
    write_lock: Arc<Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        let path = cfg
            .telemetry_enabled
            .then(|| PathBuf::from(&cfg.telemetry_path));
        Self::with_path(path, command)
    }

    pub fn disabled() -> Self {
        Self::with_path(None, String::new())
    }

    fn with_path(path: Option<PathBuf>, command: String) -> Self {
        Self {
            path,
            invocation: format!("inv-{}-{}", unix_ms_now(), std::process::id()),
            command,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn emit(&self, event: &str, payload: Value) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let mut record = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("value".to_string(), other)]),
        };
        record.insert("ts_unix_ms".to_string(), json!(unix_ms_now()));
        record.insert("event".to_string(), json!(event));
        record.insert("invocation".to_string(), json!(self.invocation));
        record.insert("command".to_string(), json!(self.command));

        if let Err(err) = self.append(path, &Value::Object(record)) {
            tracing::warn!(event, path = %path.display(), error = %err, "telemetry write failed");
        }
    }

    fn append(&self, path: &Path, record: &Value) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory '{}'", parent.display())
            })?;
        }

        let mut line = serde_json::to_string(record).context("failed to encode telemetry event")?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed to append to telemetry file '{}'", path.display()))
    }
}

/// The fields a report reads back. Anything else in a record is ignored.
#[derive(Debug, Deserialize)]
struct EventRecord {
    event: String,
    #[serde(default)]
    invocation: String,
    #[serde(default)]
    command: String,
    ts_unix_ms: Option<u64>,
    as_of: Option<String>,
    events_matched: Option<usize>,
    alerts_routed: Option<usize>,
    data_warning: Option<String>,
    agent: Option<String>,
    step: Option<String>,
    category: Option<String>,
    duration_ms: Option<u64>,
}

/// Outcome of one pipeline run, as recorded by `run.completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub command: String,
    pub as_of: String,
    pub events_matched: usize,
    pub alerts_routed: usize,
    pub data_warning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcomes {
    pub completed: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

#[derive(Debug, Default)]
pub struct TelemetryReport {
    pub lines_read: usize,
    pub skipped_lines: usize,
    pub invocations: BTreeSet<String>,
    /// Oldest first.
    pub runs: Vec<RunOutcome>,
    pub cancelled_runs: usize,
    pub http_triggers: usize,
    pub server_starts: usize,
    /// Keyed by (agent, step).
    pub generation_failures: BTreeMap<(String, String), usize>,
    pub commands: BTreeMap<String, CommandOutcomes>,
    pub failure_categories: BTreeMap<String, usize>,
    pub last_event_ts_unix_ms: Option<u64>,
}

impl TelemetryReport {
    /// Builds a report from the newest `limit` lines of a telemetry file.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>, limit: usize) -> Self {
        let lines = lines.into_iter().collect::<Vec<_>>();
        let start = lines.len().saturating_sub(limit.max(1));

        let mut report = Self::default();
        for line in &lines[start..] {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            report.lines_read += 1;
            match serde_json::from_str::<EventRecord>(line) {
                Ok(record) => report.absorb(record),
                Err(_) => report.skipped_lines += 1,
            }
        }
        report
    }

    fn absorb(&mut self, record: EventRecord) {
        if !record.invocation.is_empty() {
            self.invocations.insert(record.invocation.clone());
        }
        if let Some(ts) = record.ts_unix_ms {
            self.last_event_ts_unix_ms = self.last_event_ts_unix_ms.max(Some(ts));
        }

        match record.event.as_str() {
            "run.completed" => self.runs.push(RunOutcome {
                command: record.command,
                as_of: record.as_of.unwrap_or_default(),
                events_matched: record.events_matched.unwrap_or(0),
                alerts_routed: record.alerts_routed.unwrap_or(0),
                data_warning: record.data_warning,
            }),
            "run.cancelled" => self.cancelled_runs += 1,
            "run.triggered" => self.http_triggers += 1,
            "server.started" => self.server_starts += 1,
            "generation.failed" => {
                let key = (
                    record.agent.unwrap_or_else(|| "unknown".to_string()),
                    record.step.unwrap_or_else(|| "unknown".to_string()),
                );
                *self.generation_failures.entry(key).or_insert(0) += 1;
            }
            "command.completed" | "command.failed" => {
                let outcomes = self.commands.entry(record.command).or_default();
                outcomes.total_duration_ms += record.duration_ms.unwrap_or(0);
                if record.event == "command.completed" {
                    outcomes.completed += 1;
                } else {
                    outcomes.failed += 1;
                    let category = record.category.unwrap_or_else(|| "UNKNOWN".to_string());
                    *self.failure_categories.entry(category).or_insert(0) += 1;
                }
            }
            _ => {}
        }
    }

    pub fn alerts_routed(&self) -> usize {
        self.runs.iter().map(|run| run.alerts_routed).sum()
    }

    pub fn events_matched(&self) -> usize {
        self.runs.iter().map(|run| run.events_matched).sum()
    }

    pub fn runs_with_data_warning(&self) -> usize {
        self.runs.iter().filter(|run| run.data_warning.is_some()).count()
    }

    pub fn total_generation_failures(&self) -> usize {
        self.generation_failures.values().sum()
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "Events analyzed: {} (skipped={})",
                self.lines_read - self.skipped_lines,
                self.skipped_lines
            ),
            format!("Invocations: {}", self.invocations.len()),
            format!(
                "Pipeline runs: {} (cancelled={}, http_triggered={})",
                self.runs.len(),
                self.cancelled_runs,
                self.http_triggers
            ),
            format!(
                "Birthdays matched: {}  Alerts routed: {}  Runs with data warnings: {}",
                self.events_matched(),
                self.alerts_routed(),
                self.runs_with_data_warning()
            ),
        ];

        if let Some(last) = self.runs.last() {
            lines.push(format!(
                "Last run: as_of={} matched={} routed={} via {}",
                last.as_of, last.events_matched, last.alerts_routed, last.command
            ));
            if let Some(warning) = &last.data_warning {
                lines.push(format!("  data warning: {warning}"));
            }
        }

        lines.push(format!(
            "Generation fallbacks: {}",
            self.total_generation_failures()
        ));
        for ((agent, step), count) in &self.generation_failures {
            lines.push(format!("- {agent}/{step}: {count}"));
        }

        if !self.commands.is_empty() {
            lines.push("Commands:".to_string());
            for (name, outcomes) in &self.commands {
                lines.push(format!(
                    "- {name}: completed={} failed={} total_ms={}",
                    outcomes.completed, outcomes.failed, outcomes.total_duration_ms
                ));
            }
        }
        if !self.failure_categories.is_empty() {
            let categories = self
                .failure_categories
                .iter()
                .map(|(category, count)| format!("{category}={count}"))
                .collect::<Vec<_>>();
            lines.push(format!("Failure categories: {}", categories.join(" ")));
        }
        if self.server_starts > 0 {
            lines.push(format!("Server starts: {}", self.server_starts));
        }
        if let Some(ts) = self.last_event_ts_unix_ms {
            lines.push(format!("Last event ts_unix_ms: {ts}"));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))?;
    let report = TelemetryReport::from_lines(content.lines(), limit);

    println!("Telemetry report for {}", path.display());
    print!("{}", report.render());
    Ok(())
}
