//! Disk drive insert/eject endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::disk::InterleavePattern;
use crate::error::{CoreError, CoreResult};
use crate::manager::Selector;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DiskInsertRequest {
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiskStatusResponse {
    pub drive: u8,
    pub loaded: bool,
}

/// Drive parameter accepts `A..D` or `0..3`.
fn parse_drive(token: &str) -> CoreResult<usize> {
    match token {
        "A" | "a" | "0" => Ok(0),
        "B" | "b" | "1" => Ok(1),
        "C" | "c" | "2" => Ok(2),
        "D" | "d" | "3" => Ok(3),
        other => Err(CoreError::InvalidArgument(format!(
            "unrecognised disk drive '{}', expected A..D or 0..3",
            other
        ))),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/disk/{drive}/insert",
    params(("id" = String, Path), ("drive" = String, Path, description = "A..D or 0..3")),
    request_body = DiskInsertRequest,
    responses((status = 200, description = "Disk inserted", body = DiskStatusResponse)),
    tag = "disk"
)]
pub async fn disk_insert(
    State(state): State<AppState>,
    Path((id, drive)): Path<(String, String)>,
    Json(body): Json<DiskInsertRequest>,
) -> CoreResult<Json<DiskStatusResponse>> {
    let drive_index = parse_drive(&drive)?;
    let selector = Selector::parse(&id);
    let arc = state
        .manager
        .resolve(&selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))?;
    let mut instance = arc.lock().await;

    let interleave = InterleavePattern::default();
    let path = body.path.clone();
    let image = crate::disk::ingest_from_path(&path, interleave)?;
    instance.with_pause_barrier(move |i| {
        i.disk_drives[drive_index].insert(image);
    })?;

    state.bus.publish(crate::events::CoreEvent::DiskInserted {
        instance_id: instance.id.to_string(),
        drive: drive_index as u8,
    });

    Ok(Json(DiskStatusResponse {
        drive: drive_index as u8,
        loaded: true,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/emulator/{id}/disk/{drive}/eject",
    params(("id" = String, Path), ("drive" = String, Path, description = "A..D or 0..3")),
    responses((status = 200, description = "Disk ejected", body = DiskStatusResponse)),
    tag = "disk"
)]
pub async fn disk_eject(
    State(state): State<AppState>,
    Path((id, drive)): Path<(String, String)>,
) -> CoreResult<Json<DiskStatusResponse>> {
    let drive_index = parse_drive(&drive)?;
    let selector = Selector::parse(&id);
    let arc = state
        .manager
        .resolve(&selector)
        .await
        .ok_or_else(|| CoreError::NotFound("no such emulator instance".into()))?;
    let mut instance = arc.lock().await;

    instance.with_pause_barrier(move |i| {
        i.disk_drives[drive_index].eject();
    })?;

    state.bus.publish(crate::events::CoreEvent::DiskEjected {
        instance_id: instance.id.to_string(),
        drive: drive_index as u8,
    });

    Ok(Json(DiskStatusResponse {
        drive: drive_index as u8,
        loaded: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drive_accepts_letters_and_digits() {
        assert_eq!(parse_drive("A").unwrap(), 0);
        assert_eq!(parse_drive("d").unwrap(), 3);
        assert_eq!(parse_drive("2").unwrap(), 2);
        assert!(parse_drive("Z").is_err());
    }
}
