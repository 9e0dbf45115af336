use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::agents::memory::Event;
use crate::agents::orchestrator::{DashboardSnapshot, Orchestrator, RunSummary};
use crate::calendar::parse_as_of;
use crate::config::RuntimeConfig;
use crate::runner::build_orchestrator;
use crate::telemetry::TelemetrySink;

pub const AUTH_TOKEN_ENV: &str = "FAMILY_CONNECT_SERVER_AUTH_TOKEN";

#[derive(Clone)]
pub struct ServerState {
    pub cfg: RuntimeConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub telemetry: TelemetrySink,
    pub auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerHealthResponse {
    pub status: &'static str,
    pub profile: String,
    pub model: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub as_of: NaiveDate,
    pub events: Vec<Event>,
}

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub fn check_server_auth(
    state: &ServerState,
    headers: &axum::http::HeaderMap,
) -> Result<(), ApiError> {
    let Some(expected_token) = state.auth_token.as_deref() else {
        return Ok(());
    };

    let header_value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let provided_token = header_value
        .strip_prefix("Bearer ")
        .unwrap_or_default()
        .trim();

    if provided_token.is_empty() || provided_token != expected_token {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "missing or invalid Authorization bearer token",
        ));
    }

    Ok(())
}

fn resolve_date(query: &DateQuery) -> Result<NaiveDate, ApiError> {
    parse_as_of(query.date.as_deref().unwrap_or("today"))
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.to_string()))
}

pub async fn handle_server_health(
    State(state): State<Arc<ServerState>>,
) -> Json<ServerHealthResponse> {
    Json(ServerHealthResponse {
        status: "ok",
        profile: state.cfg.profile.clone(),
        model: state.cfg.model.clone(),
    })
}

pub async fn handle_dashboard(
    State(state): State<Arc<ServerState>>,
    headers: axum::http::HeaderMap,
) -> ApiResult<DashboardSnapshot> {
    check_server_auth(&state, &headers)?;
    Ok(Json(state.orchestrator.snapshot()))
}

pub async fn handle_events_today(
    State(state): State<Arc<ServerState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<DateQuery>,
) -> ApiResult<TodayResponse> {
    check_server_auth(&state, &headers)?;
    let as_of = resolve_date(&query)?;
    Ok(Json(TodayResponse {
        as_of,
        events: state.orchestrator.todays_events(as_of),
    }))
}

/// Triggers one pipeline run; concurrent triggers queue on the run lock.
pub async fn handle_run(
    State(state): State<Arc<ServerState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<DateQuery>,
) -> ApiResult<RunSummary> {
    check_server_auth(&state, &headers)?;
    let as_of = resolve_date(&query)?;
    tracing::info!(as_of = %as_of, "run triggered over http");
    let summary = state.orchestrator.run_once(as_of).await;
    state.telemetry.emit(
        "run.triggered",
        json!({
            "as_of": as_of.to_string(),
            "events_matched": summary.events_matched,
            "alerts_routed": summary.alerts_routed,
        }),
    );
    Ok(Json(summary))
}

pub fn build_server_router(state: Arc<ServerState>) -> AxumRouter {
    AxumRouter::new()
        .route("/healthz", get(handle_server_health))
        .route("/v1/dashboard", get(handle_dashboard))
        .route("/v1/events/today", get(handle_events_today))
        .route("/v1/run", post(handle_run))
        .with_state(state)
}

pub async fn run_server(
    cfg: RuntimeConfig,
    host: String,
    port: u16,
    telemetry: &TelemetrySink,
) -> Result<()> {
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server bind address '{}:{}'", host, port))?;
    let orchestrator = Arc::new(build_orchestrator(&cfg, telemetry)?);

    let state = Arc::new(ServerState {
        cfg: cfg.clone(),
        orchestrator,
        telemetry: telemetry.clone(),
        auth_token: std::env::var(AUTH_TOKEN_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    });

    telemetry.emit(
        "server.started",
        json!({
            "host": host,
            "port": port,
            "profile": cfg.profile,
            "model": cfg.model,
            "auth": state.auth_token.is_some(),
        }),
    );

    println!(
        "Server mode listening on http://{} (health: /healthz, dashboard: /v1/dashboard, today: /v1/events/today, run: POST /v1/run)",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind server listener")?;
    axum::serve(listener, build_server_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server runtime failed")
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { println!("\nReceived Ctrl+C, shutting down gracefully..."); }
        _ = terminate => { println!("\nReceived SIGTERM, shutting down gracefully..."); }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::http::header::AUTHORIZATION;
    use tempfile::tempdir;

    use super::*;
    use crate::agents::orchestrator::OrchestratorConfig;
    use crate::llm::testing::{ScriptedGenerator, scripted_client};

    fn state_for(dir: &std::path::Path, auth_token: Option<&str>) -> Arc<ServerState> {
        let data_path = dir.join("birthdays.json");
        std::fs::write(
            &data_path,
            r#"{"birthdays": [
                {"name": "Alice", "relationship": "daughter", "date": "2020-03-15"},
                {"name": "Bob", "relationship": "son", "date": "1990-07-04"}
            ]}"#,
        )
        .unwrap();

        let cfg = RuntimeConfig {
            profile: "default".to_string(),
            config_path: ".family-connect/config.toml".to_string(),
            model: "gpt-4o".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
            data_path: data_path.to_string_lossy().to_string(),
            generation_timeout_secs: 30,
            poll_interval_secs: 60,
            analyze_matches: false,
            telemetry_enabled: false,
            telemetry_path: dir.join("events.jsonl").to_string_lossy().to_string(),
        };
        let orchestrator = Orchestrator::wire(
            OrchestratorConfig {
                data_path,
                analyze_matches: false,
            },
            scripted_client(Arc::new(ScriptedGenerator::new())),
            TelemetrySink::disabled(),
        );
        Arc::new(ServerState {
            cfg,
            orchestrator: Arc::new(orchestrator),
            telemetry: TelemetrySink::disabled(),
            auth_token: auth_token.map(str::to_string),
        })
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        headers
    }

    #[test]
    fn auth_is_skipped_without_token_and_enforced_with_one() {
        let dir = tempdir().unwrap();
        let open = state_for(dir.path(), None);
        assert!(check_server_auth(&open, &HeaderMap::new()).is_ok());

        let locked = state_for(dir.path(), Some("s3cret"));
        let (status, _) = check_server_auth(&locked, &HeaderMap::new()).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(check_server_auth(&locked, &bearer("wrong")).is_err());
        assert!(check_server_auth(&locked, &bearer("s3cret")).is_ok());
    }

    #[tokio::test]
    async fn events_today_lists_matches_for_requested_date() {
        let dir = tempdir().unwrap();
        let state = state_for(dir.path(), None);

        let Json(body) = handle_events_today(
            State(state),
            HeaderMap::new(),
            Query(DateQuery {
                date: Some("2025-07-04".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(body.as_of, NaiveDate::from_ymd_opt(2025, 7, 4).unwrap());
        assert_eq!(body.events.len(), 1);
        assert_eq!(body.events[0].subject_name, "Bob");
    }

    #[tokio::test]
    async fn bad_date_is_a_client_error() {
        let dir = tempdir().unwrap();
        let state = state_for(dir.path(), None);

        let (status, Json(body)) = handle_run(
            State(state),
            HeaderMap::new(),
            Query(DateQuery {
                date: Some("15/03/2025".to_string()),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid date"));
    }

    #[tokio::test]
    async fn run_then_dashboard_reflects_the_pipeline() {
        let dir = tempdir().unwrap();
        let state = state_for(dir.path(), Some("tok"));

        let Json(summary) = handle_run(
            State(state.clone()),
            bearer("tok"),
            Query(DateQuery {
                date: Some("2025-03-15".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(summary.events_matched, 1);
        assert_eq!(summary.alerts_routed, 1);

        let Json(snapshot) = handle_dashboard(State(state.clone()), bearer("tok"))
            .await
            .unwrap();
        assert_eq!(snapshot.conversation_log.len(), 2);
        assert_eq!(snapshot.interactions.len(), 1);
        assert_eq!(snapshot.notifications.len(), 1);

        assert!(handle_dashboard(State(state), HeaderMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn http_run_is_recorded_in_telemetry() {
        let dir = tempdir().unwrap();
        let mut state = ServerState::clone(&state_for(dir.path(), None));
        state.cfg.telemetry_enabled = true;
        state.telemetry = TelemetrySink::new(&state.cfg, "serve".to_string());
        let telemetry_path = state.cfg.telemetry_path.clone();

        handle_run(
            State(Arc::new(state)),
            HeaderMap::new(),
            Query(DateQuery {
                date: Some("2025-07-04".to_string()),
            }),
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(telemetry_path).unwrap();
        let records = content
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["event"], "run.triggered");
        assert_eq!(records[0]["command"], "serve");
        assert_eq!(records[0]["as_of"], "2025-07-04");
        assert_eq!(records[0]["alerts_routed"], 1);

        let report = crate::telemetry::TelemetryReport::from_lines(content.lines(), 10);
        assert_eq!(report.http_triggers, 1);
    }
}
