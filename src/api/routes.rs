//! API routing: `ApiDoc` derive enumerating every handler/schema,
//! `create_router`, Swagger UI mount, request-id middleware, permissive
//! CORS.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{
    batch_handlers, debug_handlers, disk_handlers, emulator_handlers, health_handlers,
    middleware, snapshot_handlers, state_handlers, tape_handlers, ws, AppState,
};
use crate::batch::BatchDispatcher;
use crate::error::ErrorBody;
use crate::events::EventBus;
use crate::manager::EmulatorManager;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handlers::health,
        health_handlers::openapi_json,
        emulator_handlers::list_emulators,
        emulator_handlers::create_emulator,
        emulator_handlers::get_emulator,
        emulator_handlers::delete_emulator,
        emulator_handlers::start_emulator,
        emulator_handlers::stop_emulator,
        emulator_handlers::pause_emulator,
        emulator_handlers::resume_emulator,
        emulator_handlers::reset_emulator,
        snapshot_handlers::load_snapshot,
        snapshot_handlers::save_snapshot,
        tape_handlers::tape_load,
        tape_handlers::tape_eject,
        tape_handlers::tape_play,
        tape_handlers::tape_stop,
        tape_handlers::tape_rewind,
        disk_handlers::disk_insert,
        disk_handlers::disk_eject,
        batch_handlers::batch_execute,
        batch_handlers::batch_commands,
        state_handlers::memory_state,
        state_handlers::screen_state,
        state_handlers::audio_state,
        debug_handlers::list_breakpoints,
        debug_handlers::add_breakpoint,
        debug_handlers::remove_breakpoint,
        debug_handlers::debug_pause,
        debug_handlers::debug_resume,
    ),
    components(
        schemas(
            ErrorBody,
            health_handlers::HealthResponse,
            emulator_handlers::EmulatorSummary,
            emulator_handlers::CreateEmulatorRequest,
            emulator_handlers::LifecycleResponse,
            snapshot_handlers::SnapshotPathRequest,
            snapshot_handlers::SnapshotAck,
            tape_handlers::TapeLoadRequest,
            tape_handlers::TapeStatusResponse,
            crate::peripherals::TapeState,
            disk_handlers::DiskInsertRequest,
            disk_handlers::DiskStatusResponse,
            batch_handlers::BatchCommandRequest,
            batch_handlers::BatchExecuteRequest,
            batch_handlers::BatchCommandsResponse,
            crate::batch::BatchResult,
            crate::batch::BatchSummary,
            state_handlers::MemoryStateResponse,
            state_handlers::ScreenStateResponse,
            state_handlers::AudioStateResponse,
            debug_handlers::BreakpointListResponse,
            debug_handlers::BreakpointRequest,
            debug_handlers::DebugPauseResponse,
        )
    ),
    tags(
        (name = "health", description = "Health and OpenAPI document endpoints"),
        (name = "emulator", description = "Emulator instance CRUD and lifecycle"),
        (name = "snapshot", description = "SNA/Z80 snapshot load and save"),
        (name = "tape", description = "Tape transport control"),
        (name = "disk", description = "TRD/SCL disk drive insert and eject"),
        (name = "batch", description = "Bounded-parallel batch command dispatch"),
        (name = "state", description = "Read-only memory/screen/audio state inspection"),
        (name = "debug", description = "Breakpoint and debugger pause control hooks"),
    ),
    info(
        title = "ZX Spectrum Emulator Fleet Control Daemon",
        version = "0.1.0",
        description = "Control, orchestration and persistence core for a multi-instance ZX Spectrum emulator fleet",
    )
)]
pub struct ApiDoc;

/// Builds the full router: emulator manager + batch dispatcher + event bus
/// as shared `AppState`, every handler module mounted under `/api/v1`,
/// Swagger UI, permissive CORS (`Access-Control-Allow-Origin: *`), and the
/// request-id middleware.
pub fn create_router(manager: Arc<EmulatorManager>, dispatcher: Arc<BatchDispatcher>, bus: EventBus) -> Router {
    let openapi = ApiDoc::openapi();
    let state = AppState {
        manager,
        dispatcher,
        bus,
    };

    Router::new()
        .route("/health", get(health_handlers::health))
        .route("/openapi.json", get(health_handlers::openapi_json))
        .route(
            "/api/v1/emulator",
            get(emulator_handlers::list_emulators),
        )
        .route(
            "/api/v1/emulator/create",
            post(emulator_handlers::create_emulator),
        )
        .route(
            "/api/v1/emulator/:id",
            get(emulator_handlers::get_emulator).delete(emulator_handlers::delete_emulator),
        )
        .route("/api/v1/emulator/:id/start", post(emulator_handlers::start_emulator))
        .route("/api/v1/emulator/:id/stop", post(emulator_handlers::stop_emulator))
        .route("/api/v1/emulator/:id/pause", post(emulator_handlers::pause_emulator))
        .route("/api/v1/emulator/:id/resume", post(emulator_handlers::resume_emulator))
        .route("/api/v1/emulator/:id/reset", post(emulator_handlers::reset_emulator))
        .route(
            "/api/v1/emulator/:id/snapshot/load",
            post(snapshot_handlers::load_snapshot),
        )
        .route(
            "/api/v1/emulator/:id/snapshot/save",
            post(snapshot_handlers::save_snapshot),
        )
        .route("/api/v1/emulator/:id/tape/load", post(tape_handlers::tape_load))
        .route("/api/v1/emulator/:id/tape/eject", post(tape_handlers::tape_eject))
        .route("/api/v1/emulator/:id/tape/play", post(tape_handlers::tape_play))
        .route("/api/v1/emulator/:id/tape/stop", post(tape_handlers::tape_stop))
        .route("/api/v1/emulator/:id/tape/rewind", post(tape_handlers::tape_rewind))
        .route(
            "/api/v1/emulator/:id/disk/:drive/insert",
            post(disk_handlers::disk_insert),
        )
        .route(
            "/api/v1/emulator/:id/disk/:drive/eject",
            post(disk_handlers::disk_eject),
        )
        .route(
            "/api/v1/emulator/:id/state/memory",
            get(state_handlers::memory_state),
        )
        .route(
            "/api/v1/emulator/:id/state/screen",
            get(state_handlers::screen_state),
        )
        .route(
            "/api/v1/emulator/:id/state/audio",
            get(state_handlers::audio_state),
        )
        .route(
            "/api/v1/emulator/:id/breakpoints",
            get(debug_handlers::list_breakpoints).post(debug_handlers::add_breakpoint),
        )
        .route(
            "/api/v1/emulator/:id/breakpoints/:address",
            delete(debug_handlers::remove_breakpoint),
        )
        .route("/api/v1/emulator/:id/debug/pause", post(debug_handlers::debug_pause))
        .route("/api/v1/emulator/:id/debug/resume", post(debug_handlers::debug_resume))
        .route("/api/v1/batch/execute", post(batch_handlers::batch_execute))
        .route("/api/v1/batch/commands", get(batch_handlers::batch_commands))
        .route("/api/v1/websocket", get(ws::events_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(CorsLayer::permissive())
}
