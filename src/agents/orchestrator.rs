/// Orchestrator - Wires the agents and drives one-shot or polling runs.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::elderly::{ElderlyAgent, InteractionRecord};
use super::master::{AgentRoster, ConversationLogEntry, MasterAgent};
use super::memory::{DEFAULT_DATA_PATH, Event, MatchRecord, MemoryAgent};
use super::relative::{NotificationRecord, YoungerRelativeAgent};
use crate::calendar;
use crate::llm::GenerationClient;
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub data_path: PathBuf,
    pub analyze_matches: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            analyze_matches: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub as_of: NaiveDate,
    pub events_matched: usize,
    pub alerts_routed: usize,
    pub data_warning: Option<String>,
}

/// Read-only copies of every agent log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub matched_events: Vec<MatchRecord>,
    pub conversation_log: Vec<ConversationLogEntry>,
    pub interactions: Vec<InteractionRecord>,
    pub notifications: Vec<NotificationRecord>,
}

pub struct Orchestrator {
    memory: MemoryAgent,
    master: MasterAgent,
    elderly: Arc<ElderlyAgent>,
    relative: Arc<YoungerRelativeAgent>,
    telemetry: TelemetrySink,
    run_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Builds every agent and registers the elderly and younger-relative
    /// agents with the master in one step.
    pub fn wire(
        config: OrchestratorConfig,
        generation: GenerationClient,
        telemetry: TelemetrySink,
    ) -> Self {
        let elderly = Arc::new(ElderlyAgent::new(generation.clone()));
        let relative = Arc::new(YoungerRelativeAgent::new(generation.clone()));
        let roster = AgentRoster::new()
            .with_responder(elderly.clone())
            .with_notifier(relative.clone());
        let master = MasterAgent::new(generation.clone(), roster);
        let memory =
            MemoryAgent::new(config.data_path, generation).with_analysis(config.analyze_matches);

        tracing::info!(data_path = %memory.data_path().display(), "agents registered and ready");

        Self {
            memory,
            master,
            elderly,
            relative,
            telemetry,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Processes every event matching `as_of`, one at a time. Concurrent
    /// callers are serialized.
    pub async fn run_once(&self, as_of: NaiveDate) -> RunSummary {
        let _guard = self.run_lock.lock().await;
        tracing::info!(as_of = %as_of, "checking for birthdays");
        self.telemetry
            .emit("run.started", json!({ "as_of": as_of.to_string() }));

        let scan = self.memory.scan(as_of).await;
        let mut alerts_routed = 0usize;
        for event in &scan.events {
            tracing::info!(event_id = %event.id, subject = %event.subject_name, "alerting master agent");
            if self.master.route_event(event).await.is_some() {
                alerts_routed += 1;
                self.telemetry.emit(
                    "alert.routed",
                    json!({ "event_id": event.id, "as_of": as_of.to_string() }),
                );
            }
        }

        let summary = RunSummary {
            as_of,
            events_matched: scan.events.len(),
            alerts_routed,
            data_warning: scan.unavailable.map(|err| err.to_string()),
        };
        self.telemetry.emit(
            "run.completed",
            json!({
                "as_of": as_of.to_string(),
                "events_matched": summary.events_matched,
                "alerts_routed": summary.alerts_routed,
                "data_warning": summary.data_warning,
            }),
        );
        summary
    }

    /// Runs `run_once(today)` every `interval` until `cancel` fires. The token
    /// is raced against both the run and the wait, so a cancelled run is
    /// dropped at its current model call and its lock released. Agent logs
    /// keep whatever that run had already recorded. Returns the number of
    /// completed runs.
    pub async fn run_forever(&self, interval: Duration, cancel: CancellationToken) -> usize {
        tracing::info!(interval_secs = interval.as_secs(), "starting birthday monitoring");
        let mut runs = 0usize;
        while !cancel.is_cancelled() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("birthday run cancelled mid-flight");
                    self.telemetry.emit("run.cancelled", json!({ "completed_runs": runs }));
                    break;
                }
                _ = self.run_once(calendar::today()) => runs += 1,
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!(runs, "birthday monitoring stopped");
        runs
    }

    /// Today's events straight from storage, without any model calls.
    pub fn todays_events(&self, as_of: NaiveDate) -> Vec<Event> {
        self.memory.find_todays_events(as_of)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            matched_events: self.memory.matches(),
            conversation_log: self.master.conversation_log(),
            interactions: self.elderly.interactions(),
            notifications: self.relative.notifications(),
        }
    }
}
