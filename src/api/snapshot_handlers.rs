//! Snapshot load/save endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::manager::Selector;
use crate::snapshot;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SnapshotPathRequest {
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SnapshotAck {
    pub path: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/snapshot/load",
    params(("id" = String, Path)),
    request_body = SnapshotPathRequest,
    responses((status = 200, description = "Snapshot loaded", body = SnapshotAck)),
    tag = "snapshot"
)]
pub async fn load_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SnapshotPathRequest>,
) -> CoreResult<Json<SnapshotAck>> {
    let selector = Selector::parse(&id);
    let arc = state
        .manager
        .resolve(&selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))?;
    let mut instance = arc.lock().await;

    if instance.debug.debug_paused {
        return Err(CoreError::InvalidState(
            "instance is paused by the debugger; clear the debug pause before loading a snapshot".into(),
        ));
    }

    let path = body.path.clone();
    instance.with_pause_barrier(move |i| snapshot::load_from_path(&path, i))??;

    state.bus.publish(crate::events::CoreEvent::SnapshotApplied {
        instance_id: instance.id.to_string(),
        format: format!("{:?}", snapshot::SnapshotFormat::from_extension(&body.path)),
    });

    Ok(Json(SnapshotAck { path: body.path }))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/snapshot/save",
    params(("id" = String, Path)),
    request_body = SnapshotPathRequest,
    responses((status = 200, description = "Snapshot saved", body = SnapshotAck)),
    tag = "snapshot"
)]
pub async fn save_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SnapshotPathRequest>,
) -> CoreResult<Json<SnapshotAck>> {
    let selector = Selector::parse(&id);
    let arc = state
        .manager
        .resolve(&selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))?;
    let instance = arc.lock().await;
    snapshot::save_to_path(&body.path, &instance)?;
    Ok(Json(SnapshotAck { path: body.path }))
}
