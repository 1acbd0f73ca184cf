//! State inspection endpoints: `/state/memory|screen|audio`.
//!
//! Read-only views; valid only while the instance is paused or served from
//! otherwise-immutable metadata.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
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
pub struct MemoryStateResponse {
    pub bank0_is_rom: bool,
    pub bank_pages: [usize; 4],
    pub bank_kinds: [String; 4],
    pub ram_page_count: usize,
    pub rom_page_count: usize,
    pub paging_locked: bool,
    pub screen_page: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/emulator/{id}/state/memory",
    params(("id" = String, Path)),
    responses((status = 200, description = "Memory/paging state", body = MemoryStateResponse)),
    tag = "state"
)]
pub async fn memory_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<MemoryStateResponse>> {
    let arc = resolve(&state, &id).await?;
    let instance = arc.lock().await;
    let mut bank_pages = [0usize; 4];
    let mut bank_kinds: [String; 4] = Default::default();
    for bank in 0..4u8 {
        let page_ref = instance.memory.bank_mapping(bank);
        bank_pages[bank as usize] = page_ref.index;
        bank_kinds[bank as usize] = match page_ref.kind {
            crate::memory::PageKind::Rom => "rom".to_string(),
            crate::memory::PageKind::Ram => "ram".to_string(),
        };
    }
    Ok(Json(MemoryStateResponse {
        bank0_is_rom: instance.memory.is_bank0_rom(),
        bank_pages,
        bank_kinds,
        ram_page_count: instance.memory.ram_page_count(),
        rom_page_count: instance.memory.rom_page_count(),
        paging_locked: instance.port_decoder.is_locked(),
        screen_page: instance.port_decoder.screen_page(),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScreenStateResponse {
    pub width: usize,
    pub height: usize,
    pub border: u8,
    pub flash_phase: u8,
}

#[utoipa::path(
    get,
    path = "/api/v1/emulator/{id}/state/screen",
    params(("id" = String, Path)),
    responses((status = 200, description = "Screen state", body = ScreenStateResponse)),
    tag = "state"
)]
pub async fn screen_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<ScreenStateResponse>> {
    let arc = resolve(&state, &id).await?;
    let instance = arc.lock().await;
    Ok(Json(ScreenStateResponse {
        width: crate::peripherals::SCREEN_WIDTH,
        height: crate::peripherals::SCREEN_HEIGHT,
        border: instance.screen.border,
        flash_phase: instance.screen.flash_phase,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AudioStateResponse {
    pub enabled: bool,
    pub ay_registers: Vec<[u8; 16]>,
}

#[utoipa::path(
    get,
    path = "/api/v1/emulator/{id}/state/audio",
    params(("id" = String, Path)),
    responses((status = 200, description = "Sound manager state", body = AudioStateResponse)),
    tag = "state"
)]
pub async fn audio_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CoreResult<Json<AudioStateResponse>> {
    let arc = resolve(&state, &id).await?;
    let instance = arc.lock().await;
    Ok(Json(AudioStateResponse {
        enabled: instance.sound.enabled,
        ay_registers: instance.sound.ay_registers.to_vec(),
    }))
}
