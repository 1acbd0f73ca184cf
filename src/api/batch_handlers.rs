//! Batch execution endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::batch::{BatchCommand, BatchSummary, BATCHABLE_COMMANDS};
use crate::error::CoreError;
use crate::manager::Selector;

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchCommandRequest {
    pub emulator: String,
    pub command: String,
    #[serde(default)]
    pub arg1: Option<String>,
    #[serde(default)]
    pub arg2: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchExecuteRequest {
    pub commands: Vec<BatchCommandRequest>,
}

/// 200 if every command in the batch succeeded, 207 (multi-status) if at
/// least one failed.
#[utoipa::path(
    post,
    path = "/api/v1/batch/execute",
    request_body = BatchExecuteRequest,
    responses(
        (status = 200, description = "All commands succeeded", body = BatchSummary),
        (status = 207, description = "Partial success", body = BatchSummary),
    ),
    tag = "batch"
)]
pub async fn batch_execute(
    State(state): State<AppState>,
    Json(body): Json<BatchExecuteRequest>,
) -> Result<(StatusCode, Json<BatchSummary>), CoreError> {
    let commands = body
        .commands
        .into_iter()
        .map(|c| BatchCommand {
            selector: Selector::parse(&c.emulator),
            command: c.command,
            arg1: c.arg1.unwrap_or_default(),
            arg2: c.arg2.unwrap_or_default(),
        })
        .collect();

    let summary = state.dispatcher.execute(commands).await?;

    state.bus.publish(crate::events::CoreEvent::BatchCompleted {
        total: summary.total,
        succeeded: summary.succeeded,
        failed: summary.failed,
    });

    let status = if summary.failed == 0 {
        StatusCode::OK
    } else {
        StatusCode::from_u16(207).unwrap()
    };
    Ok((status, Json(summary)))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchCommandsResponse {
    pub commands: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/batch/commands",
    responses((status = 200, description = "Whitelisted batch commands", body = BatchCommandsResponse)),
    tag = "batch"
)]
pub async fn batch_commands() -> Json<BatchCommandsResponse> {
    Json(BatchCommandsResponse {
        commands: BATCHABLE_COMMANDS.iter().map(|s| s.to_string()).collect(),
    })
}
