//! Emulator CRUD + lifecycle endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::manager::Selector;

#[derive(Debug, Serialize, ToSchema)]
pub struct EmulatorSummary {
    pub id: String,
    pub symbolic_id: Option<String>,
    pub state: String,
    pub model: String,
    pub ram_kb: u32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmulatorRequest {
    pub symbolic_id: Option<String>,
    pub model: Option<String>,
    pub ram_size: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LifecycleResponse {
    pub state: String,
}

fn not_found() -> CoreError {
    CoreError::NotFound("no such emulator instance".into())
}

#[utoipa::path(
    get,
    path = "/api/v1/emulator",
    responses((status = 200, description = "List live instances", body = [EmulatorSummary])),
    tag = "emulator"
)]
pub async fn list_emulators(State(state): State<AppState>) -> Json<Vec<EmulatorSummary>> {
    let mut out = Vec::new();
    for arc in state.manager.list().await {
        let instance = arc.lock().await;
        out.push(EmulatorSummary {
            id: instance.id.to_string(),
            symbolic_id: instance.symbolic_id.clone(),
            state: instance.state().as_str().to_string(),
            model: instance.config.model.as_str().to_string(),
            ram_kb: instance.config.ram_kb,
        });
    }
    Json(out)
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/create",
    request_body = CreateEmulatorRequest,
    responses((status = 201, description = "Instance created", body = EmulatorSummary)),
    tag = "emulator"
)]
pub async fn create_emulator(
    State(state): State<AppState>,
    Json(body): Json<CreateEmulatorRequest>,
) -> Result<(StatusCode, Json<EmulatorSummary>), CoreError> {
    let arc = state
        .manager
        .create(body.symbolic_id, body.model, body.ram_size)
        .await?;
    let instance = arc.lock().await;
    Ok((
        StatusCode::CREATED,
        Json(EmulatorSummary {
            id: instance.id.to_string(),
            symbolic_id: instance.symbolic_id.clone(),
            state: instance.state().as_str().to_string(),
            model: instance.config.model.as_str().to_string(),
            ram_kb: instance.config.ram_kb,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/emulator/{id}",
    params(("id" = String, Path, description = "UUID, symbolic id, or decimal index")),
    responses((status = 200, description = "Instance description", body = EmulatorSummary)),
    tag = "emulator"
)]
pub async fn get_emulator(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<EmulatorSummary>> {
    let selector = Selector::parse(&id);
    let arc = state.manager.resolve(&selector).await.ok_or_else(not_found)?;
    let instance = arc.lock().await;
    Ok(Json(EmulatorSummary {
        id: instance.id.to_string(),
        symbolic_id: instance.symbolic_id.clone(),
        state: instance.state().as_str().to_string(),
        model: instance.config.model.as_str().to_string(),
        ram_kb: instance.config.ram_kb,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/emulator/{id}",
    params(("id" = String, Path, description = "UUID, symbolic id, or decimal index")),
    responses((status = 204, description = "Instance removed")),
    tag = "emulator"
)]
pub async fn delete_emulator(State(state): State<AppState>, Path(id): Path<String>) -> CoreResult<StatusCode> {
    let selector = Selector::parse(&id);
    state.manager.remove(&selector).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn apply_transition(
    state: AppState,
    id: String,
    transition: fn(&mut crate::instance::Instance) -> CoreResult<()>,
) -> CoreResult<Json<LifecycleResponse>> {
    let selector = Selector::parse(&id);
    let arc = state.manager.resolve(&selector).await.ok_or_else(not_found)?;
    let mut instance = arc.lock().await;
    transition(&mut instance)?;
    Ok(Json(LifecycleResponse {
        state: instance.state().as_str().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/start",
    params(("id" = String, Path)),
    responses((status = 200, description = "Started", body = LifecycleResponse)),
    tag = "emulator"
)]
pub async fn start_emulator(state: State<AppState>, path: Path<String>) -> CoreResult<Json<LifecycleResponse>> {
    apply_transition(state.0, path.0, |i| i.start()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/stop",
    params(("id" = String, Path)),
    responses((status = 200, description = "Stopped", body = LifecycleResponse)),
    tag = "emulator"
)]
pub async fn stop_emulator(state: State<AppState>, path: Path<String>) -> CoreResult<Json<LifecycleResponse>> {
    apply_transition(state.0, path.0, |i| i.stop()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/pause",
    params(("id" = String, Path)),
    responses((status = 200, description = "Paused", body = LifecycleResponse)),
    tag = "emulator"
)]
pub async fn pause_emulator(state: State<AppState>, path: Path<String>) -> CoreResult<Json<LifecycleResponse>> {
    apply_transition(state.0, path.0, |i| i.pause()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/resume",
    params(("id" = String, Path)),
    responses((status = 200, description = "Resumed", body = LifecycleResponse)),
    tag = "emulator"
)]
pub async fn resume_emulator(state: State<AppState>, path: Path<String>) -> CoreResult<Json<LifecycleResponse>> {
    apply_transition(state.0, path.0, |i| i.resume()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/reset",
    params(("id" = String, Path)),
    responses((status = 200, description = "Reset", body = LifecycleResponse)),
    tag = "emulator"
)]
pub async fn reset_emulator(state: State<AppState>, path: Path<String>) -> CoreResult<Json<LifecycleResponse>> {
    apply_transition(state.0, path.0, |i| i.reset()).await
}
