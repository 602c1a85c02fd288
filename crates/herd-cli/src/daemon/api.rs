use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use herd_supervisor::{Error, ErrorKind, ProcessState, Supervisor};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

const DEFAULT_LOG_LINES: usize = 100;

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
}

pub fn router(supervisor: Arc<Supervisor>) -> Router {
	let state = AppState { supervisor };

	Router::new()
		.route("/api/processes", get(list_processes))
		.route("/api/processes/{name}", get(process_detail))
		.route("/api/processes/{name}/start", post(start_process))
		.route("/api/processes/{name}/stop", post(stop_process))
		.route("/api/processes/{name}/restart", post(restart_process))
		.route("/api/processes/{name}/logs", get(process_logs))
		.layer(CorsLayer::permissive())
		.with_state(state)
}

#[derive(Serialize)]
struct ProcessDetail {
	#[serde(flatten)]
	state: ProcessState,
	command: String,
	cwd: String,
	autostart: bool,
	autorestart: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
	error: String,
	kind: ErrorKind,
}

#[derive(Deserialize)]
struct LogsQuery {
	lines: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: Error) -> ApiError {
	let status = match err.kind() {
		ErrorKind::UnknownName => StatusCode::NOT_FOUND,
		ErrorKind::Config => StatusCode::BAD_REQUEST,
		ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
		ErrorKind::Spawn | ErrorKind::ExhaustedRetries | ErrorKind::Internal => {
			StatusCode::INTERNAL_SERVER_ERROR
		}
	};
	(status, Json(ErrorResponse { error: err.to_string(), kind: err.kind() }))
}

async fn list_processes(State(state): State<AppState>) -> Json<Vec<ProcessState>> {
	Json(state.supervisor.list())
}

async fn process_detail(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<ProcessDetail>, ApiError> {
	let sup = &state.supervisor;
	let spec = sup.spec(&name).map_err(api_error)?;
	let status = sup.status(&name).map_err(api_error)?;
	Ok(Json(ProcessDetail {
		state: status,
		command: spec.command_line(),
		cwd: spec.cwd.to_string_lossy().to_string(),
		autostart: spec.autostart,
		autorestart: spec.restart.autorestart,
	}))
}

async fn start_process(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<ProcessState>, ApiError> {
	state.supervisor.start(&name).await.map(Json).map_err(api_error)
}

async fn stop_process(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<ProcessState>, ApiError> {
	state.supervisor.stop(&name).await.map(Json).map_err(api_error)
}

async fn restart_process(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<ProcessState>, ApiError> {
	state.supervisor.restart(&name).await.map(Json).map_err(api_error)
}

async fn process_logs(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Query(query): Query<LogsQuery>,
) -> Result<String, ApiError> {
	let output = state.supervisor.output(&name).map_err(api_error)?;
	Ok(output.tail(query.lines.unwrap_or(DEFAULT_LOG_LINES)).await)
}
