//! Debug control hooks: breakpoint CRUD and a debugger-initiated pause/
//! resume pair, independent of the lifecycle state machine. Breakpoint
//! storage and the debugger's own pause flag live on
//! `DebugManager`; disassembly/analyzer internals stay out of scope.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::manager::Selector;

async fn resolve(
    state: &AppState,
    id: &str,
) -> CoreResult<std::sync::Arc<tokio::sync::Mutex<crate::instance::Instance>>> {
    let selector = Selector::parse(id);
    state
        .manager
        .resolve(&selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BreakpointListResponse {
    pub breakpoints: Vec<u16>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BreakpointRequest {
    pub address: u16,
}

#[utoipa::path(
    get,
    path = "/api/v1/emulator/{id}/breakpoints",
    params(("id" = String, Path)),
    responses((status = 200, description = "Breakpoint list", body = BreakpointListResponse)),
    tag = "debug"
)]
pub async fn list_breakpoints(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<BreakpointListResponse>> {
    let arc = resolve(&state, &id).await?;
    let instance = arc.lock().await;
    Ok(Json(BreakpointListResponse {
        breakpoints: instance.debug.breakpoints.clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/breakpoints",
    params(("id" = String, Path)),
    request_body = BreakpointRequest,
    responses((status = 201, description = "Breakpoint added", body = BreakpointListResponse)),
    tag = "debug"
)]
pub async fn add_breakpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BreakpointRequest>,
) -> CoreResult<(StatusCode, Json<BreakpointListResponse>)> {
    let arc = resolve(&state, &id).await?;
    let mut instance = arc.lock().await;
    instance.debug.add_breakpoint(body.address);
    Ok((
        StatusCode::CREATED,
        Json(BreakpointListResponse {
            breakpoints: instance.debug.breakpoints.clone(),
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/emulator/{id}/breakpoints/{address}",
    params(("id" = String, Path), ("address" = u16, Path)),
    responses(
        (status = 200, description = "Breakpoint removed", body = BreakpointListResponse),
        (status = 404, description = "No such breakpoint"),
    ),
    tag = "debug"
)]
pub async fn remove_breakpoint(
    State(state): State<AppState>,
    Path((id, address)): Path<(String, u16)>,
) -> CoreResult<Json<BreakpointListResponse>> {
    let arc = resolve(&state, &id).await?;
    let mut instance = arc.lock().await;
    if !instance.debug.remove_breakpoint(address) {
        return Err(CoreError::NotFound(format!("no breakpoint at 0x{:04X}", address)));
    }
    Ok(Json(BreakpointListResponse {
        breakpoints: instance.debug.breakpoints.clone(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DebugPauseResponse {
    pub debug_paused: bool,
}

/// Sets the debugger's own pause flag, distinct from the lifecycle
/// `Paused` state — a batch or direct snapshot load against an instance
/// with this flag set is rejected as `InvalidState` until cleared (see
/// DESIGN.md for the rationale).
#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/debug/pause",
    params(("id" = String, Path)),
    responses((status = 200, description = "Debugger pause flag set", body = DebugPauseResponse)),
    tag = "debug"
)]
pub async fn debug_pause(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<DebugPauseResponse>> {
    let arc = resolve(&state, &id).await?;
    let mut instance = arc.lock().await;
    instance.debug.debug_paused = true;
    Ok(Json(DebugPauseResponse { debug_paused: true }))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/debug/resume",
    params(("id" = String, Path)),
    responses((status = 200, description = "Debugger pause flag cleared", body = DebugPauseResponse)),
    tag = "debug"
)]
pub async fn debug_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<DebugPauseResponse>> {
    let arc = resolve(&state, &id).await?;
    let mut instance = arc.lock().await;
    instance.debug.debug_paused = false;
    Ok(Json(DebugPauseResponse { debug_paused: false }))
}
