//! HTTP control API: stands in for the clock's physical buttons.
//!
//! The server runs on the tokio runtime while the frame loop runs on a plain
//! `std::thread`. Offset changes are written straight to the shared atomic;
//! brightness and resync requests go through an `mpsc` channel that the
//! frame loop drains every iteration.
//!
//! ## Rust concepts
//! - axum extractors: `State` and `Json`
//! - `Result<StatusCode, (StatusCode, String)>` as an error response
//! - utoipa derives that turn handler attributes into an OpenAPI document

use crate::countdown::UtcOffset;
use crate::scheduler::{ControlCommand, DisplayStatus};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, cloned into every handler.
///
/// Rust concept: Sender is Clone
/// axum clones the state per request. `Sender` and `Arc` are both handles,
/// so every clone still talks to the one frame loop and sees the one
/// offset.
#[derive(Clone)]
pub struct AppState {
    /// Channel to the frame loop
    pub command_tx: Sender<ControlCommand>,
    /// Display status (frame loop writes, handlers read)
    pub status: Arc<Mutex<DisplayStatus>>,
    /// UTC offset shared with the countdown engine
    pub offset: Arc<UtcOffset>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        post_offset_up,
        post_offset_down,
        post_brightness,
        post_brightness_up,
        post_brightness_down,
        post_resync,
    ),
    components(schemas(DisplayStatus, OffsetResponse, BrightnessRequest)),
    tags(
        (name = "clock", description = "Countdown clock controls"),
        (name = "display", description = "Display control endpoints"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "Climate Clock API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP controls for the LED matrix climate clock"
    )
)]
pub struct ApiDoc;

// ── Request/Response types ───────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, utoipa::ToSchema)]
pub struct OffsetResponse {
    /// UTC offset in hours after the change
    #[schema(example = 1)]
    pub utc_offset: i32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BrightnessRequest {
    /// Brightness level (0-100)
    #[schema(example = 50, minimum = 0, maximum = 100)]
    value: u8,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(
                    utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
                        .validator_url("none"),
                ),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/offset/up", post(post_offset_up))
        .route("/api/v1/offset/down", post(post_offset_down))
        .route("/api/v1/brightness", post(post_brightness))
        .route("/api/v1/brightness/up", post(post_brightness_up))
        .route("/api/v1/brightness/down", post(post_brightness_down))
        .route("/api/v1/resync", post(post_resync))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status — what the display currently shows
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current display status", body = DisplayStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<DisplayStatus> {
    let status = match state.status.lock() {
        Ok(s) => s.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    Json(status)
}

/// POST /api/v1/offset/up — one hour later
#[utoipa::path(
    post,
    path = "/api/v1/offset/up",
    tag = "clock",
    responses(
        (status = 200, description = "Offset raised", body = OffsetResponse)
    )
)]
async fn post_offset_up(State(state): State<AppState>) -> Json<OffsetResponse> {
    Json(adjust_offset(&state, 1))
}

/// POST /api/v1/offset/down — one hour earlier
#[utoipa::path(
    post,
    path = "/api/v1/offset/down",
    tag = "clock",
    responses(
        (status = 200, description = "Offset lowered", body = OffsetResponse)
    )
)]
async fn post_offset_down(State(state): State<AppState>) -> Json<OffsetResponse> {
    Json(adjust_offset(&state, -1))
}

fn adjust_offset(state: &AppState, delta: i32) -> OffsetResponse {
    let utc_offset = state.offset.adjust(delta);
    tracing::info!("UTC offset now {:+}", utc_offset);
    OffsetResponse { utc_offset }
}

/// POST /api/v1/brightness — set display brightness (0-100)
#[utoipa::path(
    post,
    path = "/api/v1/brightness",
    tag = "display",
    request_body = BrightnessRequest,
    responses(
        (status = 200, description = "Brightness updated"),
    )
)]
async fn post_brightness(
    State(state): State<AppState>,
    Json(req): Json<BrightnessRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, ControlCommand::SetBrightness(req.value))
}

/// POST /api/v1/brightness/up — one step brighter
#[utoipa::path(
    post,
    path = "/api/v1/brightness/up",
    tag = "display",
    responses(
        (status = 200, description = "Brightness raised"),
    )
)]
async fn post_brightness_up(
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, ControlCommand::BrightnessUp)
}

/// POST /api/v1/brightness/down — one step dimmer
#[utoipa::path(
    post,
    path = "/api/v1/brightness/down",
    tag = "display",
    responses(
        (status = 200, description = "Brightness lowered"),
    )
)]
async fn post_brightness_down(
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, ControlCommand::BrightnessDown)
}

/// POST /api/v1/resync — resync the clock from the network
///
/// The display pauses while the sync runs.
#[utoipa::path(
    post,
    path = "/api/v1/resync",
    tag = "clock",
    responses(
        (status = 202, description = "Resync queued"),
    )
)]
async fn post_resync(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    send_command(&state, ControlCommand::Resync).map(|_| StatusCode::ACCEPTED)
}

fn send_command(state: &AppState, cmd: ControlCommand) -> Result<StatusCode, (StatusCode, String)> {
    state.command_tx.send(cmd).map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Frame loop gone".to_string(),
        )
    })?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::mpsc::{self, Receiver};

    fn state() -> (AppState, Receiver<ControlCommand>) {
        let (tx, rx) = mpsc::channel();
        let state = AppState {
            command_tx: tx,
            status: Arc::new(Mutex::new(DisplayStatus::new())),
            offset: Arc::new(UtcOffset::new(0)),
        };
        (state, rx)
    }

    #[tokio::test]
    async fn offset_endpoints_adjust_shared_atomic() {
        let (state, _rx) = state();
        let Json(up) = post_offset_up(State(state.clone())).await;
        assert_eq!(up, OffsetResponse { utc_offset: 1 });
        post_offset_up(State(state.clone())).await;
        let Json(down) = post_offset_down(State(state.clone())).await;
        assert_eq!(down.utc_offset, 1);
        assert_eq!(state.offset.hours(), 1);
    }

    #[tokio::test]
    async fn status_reports_published_offset() {
        let (state, _rx) = state();
        state.status.lock().unwrap().line1 = "COUNTDOWN".to_string();
        // Not applied by the frame loop yet
        state.offset.adjust(-4);

        let Json(status) = get_status(State(state)).await;
        assert_eq!(status.utc_offset, 0);
        assert_eq!(status.line1, "COUNTDOWN");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn brightness_and_resync_are_queued() {
        let (state, rx) = state();
        let code = post_brightness(State(state.clone()), Json(BrightnessRequest { value: 80 }))
            .await
            .unwrap();
        assert_eq!(code, StatusCode::OK);
        post_brightness_up(State(state.clone())).await.unwrap();
        post_brightness_down(State(state.clone())).await.unwrap();
        let code = post_resync(State(state)).await.unwrap();
        assert_eq!(code, StatusCode::ACCEPTED);

        let queued: Vec<ControlCommand> = rx.try_iter().collect();
        assert_eq!(
            queued,
            vec![
                ControlCommand::SetBrightness(80),
                ControlCommand::BrightnessUp,
                ControlCommand::BrightnessDown,
                ControlCommand::Resync,
            ]
        );
    }

    #[tokio::test]
    async fn commands_fail_once_frame_loop_is_gone() {
        let (state, rx) = state();
        drop(rx);
        let err = post_resync(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        let paths = json["paths"].as_object().unwrap();
        for route in [
            "/api/v1/status",
            "/api/v1/offset/up",
            "/api/v1/offset/down",
            "/api/v1/brightness",
            "/api/v1/brightness/up",
            "/api/v1/brightness/down",
            "/api/v1/resync",
        ] {
            assert!(paths.contains_key(route), "missing {route}");
        }
    }
}
