use super::state::{AppState, InterviewSlot};
use crate::api::BackendError;
use crate::capture::CaptureFactory;
use crate::session::SessionController;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub code: String,
    pub attempt_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub code: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub code: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /interview/:code/join
/// Validate the code against the backend, then acquire media and stand up
/// a prepared attempt in the slot.
pub async fn join_interview(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> impl IntoResponse {
    let code = code.trim().to_string();
    if code.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Please enter an interview code.");
    }

    info!("Join requested for interview code: {}", code);

    let mut slot = state.slot.write().await;

    // One attempt at a time; a finished one may be replaced.
    if let Some(handle) = slot.handle() {
        if !handle.lifecycle().is_terminal() {
            return error_response(
                StatusCode::CONFLICT,
                format!("Interview {} is already in progress", handle.code()),
            );
        }
    }

    let config = match state.backend.fetch_config(&code).await {
        Ok(config) => config,
        Err(BackendError::InvalidCode) => {
            return error_response(StatusCode::NOT_FOUND, BackendError::InvalidCode.to_string());
        }
        Err(BackendError::Network(e)) => {
            error!("Config fetch failed: {}", e);
            return error_response(
                StatusCode::BAD_GATEWAY,
                "Network error or backend is unavailable.",
            );
        }
        Err(e) => {
            error!("Config fetch failed: {}", e);
            return error_response(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let capture = match CaptureFactory::create(
        state.capture_source.clone(),
        state.capture_config.clone(),
    ) {
        Ok(capture) => capture,
        Err(e) => {
            error!("Failed to create capture backend: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to acquire media devices: {}", e),
            );
        }
    };

    let mut controller = SessionController::new(
        config,
        state.settings.clone(),
        Arc::clone(&state.connector),
        Arc::clone(&state.backend),
    );
    // Headless service: agent audio is mixed into the recording but not
    // rendered anywhere.
    let sink = Box::new(crate::audio::NullSink);
    if let Err(e) = controller.prepare(capture, sink).await {
        error!("Media setup failed: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Media setup failed: {}", e),
        );
    }

    let handle = controller.handle();
    let attempt_id = handle.attempt_id();
    *slot = InterviewSlot::Joined { controller, handle };

    info!("Interview {} joined (attempt {})", code, attempt_id);

    (
        StatusCode::OK,
        Json(JoinResponse {
            code: code.clone(),
            attempt_id,
            status: "ready".to_string(),
            message: format!("Interview {} ready to start", code),
        }),
    )
        .into_response()
}

/// POST /interview/start
/// Connect the prepared attempt to the agent and launch the dispatch loop.
pub async fn start_interview(State(state): State<AppState>) -> impl IntoResponse {
    let mut slot = state.slot.write().await;

    match std::mem::replace(&mut *slot, InterviewSlot::Empty) {
        InterviewSlot::Joined {
            mut controller,
            handle,
        } => {
            let code = handle.code().to_string();
            match controller.connect().await {
                Ok(()) => {
                    info!("Interview {} connecting", code);
                    let task = tokio::spawn(controller.run());
                    *slot = InterviewSlot::Running {
                        handle: handle.clone(),
                        task,
                    };
                    (
                        StatusCode::OK,
                        Json(StartResponse {
                            code: code.clone(),
                            status: "connecting".to_string(),
                            message: format!("Interview {} starting", code),
                        }),
                    )
                        .into_response()
                }
                Err(e) if e.keeps_media() => {
                    // Retryable: the attempt keeps its media and stays in
                    // the slot.
                    error!("Failed to start interview {}: {}", code, e);
                    *slot = InterviewSlot::Joined { controller, handle };
                    error_response(StatusCode::BAD_GATEWAY, e.to_string())
                }
                Err(e) => {
                    error!("Failed to start interview {}: {}", code, e);
                    *slot = InterviewSlot::Joined { controller, handle };
                    error_response(StatusCode::CONFLICT, e.to_string())
                }
            }
        }
        other => {
            let response = match &other {
                InterviewSlot::Empty => {
                    error_response(StatusCode::NOT_FOUND, "No interview joined")
                }
                _ => error_response(StatusCode::CONFLICT, "Interview already started"),
            };
            *slot = other;
            response
        }
    }
}

/// POST /interview/stop
/// Ask the running attempt to end. The unwind is asynchronous; poll status
/// for the end message.
pub async fn stop_interview(State(state): State<AppState>) -> impl IntoResponse {
    let slot = state.slot.read().await;

    match &*slot {
        InterviewSlot::Running { handle, .. } => {
            info!("Stop requested for interview {}", handle.code());
            handle.stop().await;
            (
                StatusCode::OK,
                Json(StopResponse {
                    code: handle.code().to_string(),
                    status: "stopping".to_string(),
                    message: "Interview stop requested".to_string(),
                }),
            )
                .into_response()
        }
        InterviewSlot::Joined { .. } => {
            error_response(StatusCode::CONFLICT, "Interview has not started")
        }
        InterviewSlot::Empty => error_response(StatusCode::NOT_FOUND, "No interview joined"),
    }
}

/// GET /interview/status
/// Lifecycle, countdown, and end message for the current attempt.
pub async fn interview_status(State(state): State<AppState>) -> impl IntoResponse {
    let slot = state.slot.read().await;

    match slot.handle() {
        Some(handle) => (StatusCode::OK, Json(handle.status().await)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No interview joined"),
    }
}

/// GET /interview/transcript
/// The conversation log accumulated so far, in arrival order.
pub async fn interview_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let slot = state.slot.read().await;

    match slot.handle() {
        Some(handle) => (StatusCode::OK, Json(handle.transcript().await)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No interview joined"),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
