//! Tape transport endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::manager::Selector;
use crate::peripherals::TapeState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TapeLoadRequest {
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TapeStatusResponse {
    pub path: Option<String>,
    pub state: TapeState,
    pub position: u64,
}

async fn resolve(state: &AppState, id: &str) -> CoreResult<std::sync::Arc<tokio::sync::Mutex<crate::instance::Instance>>> {
    let selector = Selector::parse(id);
    state
        .manager
        .resolve(&selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/tape/load",
    params(("id" = String, Path)),
    request_body = TapeLoadRequest,
    responses((status = 200, description = "Tape loaded", body = TapeStatusResponse)),
    tag = "tape"
)]
pub async fn tape_load(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TapeLoadRequest>,
) -> CoreResult<Json<TapeStatusResponse>> {
    let arc = resolve(&state, &id).await?;
    let mut instance = arc.lock().await;
    let path = body.path.clone();
    instance.with_pause_barrier(|i| i.tape.load(path))?;
    state.bus.publish(crate::events::CoreEvent::TapeStateChanged {
        instance_id: instance.id.to_string(),
        state: format!("{:?}", instance.tape.state).to_lowercase(),
    });
    Ok(Json(TapeStatusResponse {
        path: instance.tape.path.clone(),
        state: instance.tape.state,
        position: instance.tape.position,
    }))
}

async fn tape_transition(
    state: AppState,
    id: String,
    f: fn(&mut crate::peripherals::Tape),
) -> CoreResult<Json<TapeStatusResponse>> {
    let arc = resolve(&state, &id).await?;
    let mut instance = arc.lock().await;
    instance.with_pause_barrier(|i| f(&mut i.tape))?;
    state.bus.publish(crate::events::CoreEvent::TapeStateChanged {
        instance_id: instance.id.to_string(),
        state: format!("{:?}", instance.tape.state).to_lowercase(),
    });
    Ok(Json(TapeStatusResponse {
        path: instance.tape.path.clone(),
        state: instance.tape.state,
        position: instance.tape.position,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/tape/eject",
    params(("id" = String, Path)),
    responses((status = 200, description = "Tape ejected", body = TapeStatusResponse)),
    tag = "tape"
)]
pub async fn tape_eject(state: State<AppState>, path: Path<String>) -> CoreResult<Json<TapeStatusResponse>> {
    tape_transition(state.0, path.0, |t| t.eject()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/tape/play",
    params(("id" = String, Path)),
    responses((status = 200, description = "Tape playing", body = TapeStatusResponse)),
    tag = "tape"
)]
pub async fn tape_play(state: State<AppState>, path: Path<String>) -> CoreResult<Json<TapeStatusResponse>> {
    tape_transition(state.0, path.0, |t| t.play()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/tape/stop",
    params(("id" = String, Path)),
    responses((status = 200, description = "Tape stopped", body = TapeStatusResponse)),
    tag = "tape"
)]
pub async fn tape_stop(state: State<AppState>, path: Path<String>) -> CoreResult<Json<TapeStatusResponse>> {
    tape_transition(state.0, path.0, |t| t.stop()).await
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/tape/rewind",
    params(("id" = String, Path)),
    responses((status = 200, description = "Tape rewound", body = TapeStatusResponse)),
    tag = "tape"
)]
pub async fn tape_rewind(state: State<AppState>, path: Path<String>) -> CoreResult<Json<TapeStatusResponse>> {
    tape_transition(state.0, path.0, |t| t.rewind()).await
}
