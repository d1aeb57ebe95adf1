use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use colloquy_core::ids::RunId;
use colloquy_core::state::RunRequest;
use colloquy_engine::EngineError;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRunBody {
    pub selected_agents: Vec<String>,
    pub initial_message: String,
    pub max_turns: u32,
}

#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: RunId,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::AlreadyRunning => StatusCode::CONFLICT,
        EngineError::Client(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// POST /run/start — validate and launch a run. 202 because the relay runs
/// in the background; progress is observed through GET /run/state.
pub async fn start_run(
    State(state): State<AppState>,
    Json(body): Json<StartRunBody>,
) -> impl IntoResponse {
    let request = RunRequest {
        selected_agents: body.selected_agents,
        initial_message: body.initial_message,
        max_turns: body.max_turns,
    };
    match state.orchestrator.start(request) {
        Ok(run_id) => (StatusCode::ACCEPTED, Json(StartRunResponse { run_id })).into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// POST /run/stop — request a cooperative stop. `stopped: false` means
/// nothing was running.
pub async fn stop_run(State(state): State<AppState>) -> impl IntoResponse {
    let stopped = state.orchestrator.stop();
    (StatusCode::OK, Json(StopResponse { stopped }))
}

/// POST /run/reset — clear the conversation. Refused while a run is live.
pub async fn reset_run(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.reset() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err).into_response(),
    }
}

/// GET /run/state — current conversation snapshot.
pub async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.orchestrator.state()))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "healthy"})))
}
