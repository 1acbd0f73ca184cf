//! Process-wide configuration: bind address, batch pool size, the disk
//! interleave default, and the model catalogue `EmulatorManager::create`
//! validates against.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::ToSchema;

/// Known emulator models and the RAM sizes (KiB) each permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Spectrum48,
    Spectrum128,
}

impl Model {
    pub fn parse(name: &str) -> Option<Model> {
        match name {
            "48k" | "spectrum48" | "Spectrum48" => Some(Model::Spectrum48),
            "128k" | "spectrum128" | "Spectrum128" => Some(Model::Spectrum128),
            _ => None,
        }
    }

    pub fn allowed_ram_kb(&self) -> &'static [u32] {
        match self {
            Model::Spectrum48 => &[48],
            Model::Spectrum128 => &[128],
        }
    }

    pub fn default_ram_kb(&self) -> u32 {
        self.allowed_ram_kb()[0]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Spectrum48 => "48k",
            Model::Spectrum128 => "128k",
        }
    }
}

/// Static lookup table used by `EmulatorManager::create`.
pub struct ModelCatalogue;

impl ModelCatalogue {
    pub fn resolve(name: &str) -> Option<Model> {
        Model::parse(name)
    }

    pub fn validate_ram(model: Model, ram_kb: u32) -> bool {
        model.allowed_ram_kb().contains(&ram_kb)
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind_addr: SocketAddr,
    pub batch_workers: usize,
    pub trdos_interleave: u8,
}

impl DaemonConfig {
    /// Reads `ZXD_BIND` / `ZXD_BATCH_WORKERS` / `ZXD_TRDOS_INTERLEAVE`
    /// overrides, falling back to the fixed default contract (TCP 8090,
    /// any-address) and the documented interleave/worker defaults.
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("ZXD_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "0.0.0.0:8090".parse().unwrap());

        let batch_workers = std::env::var("ZXD_BATCH_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        let trdos_interleave = std::env::var("ZXD_TRDOS_INTERLEAVE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1u8);

        Self {
            bind_addr,
            batch_workers,
            trdos_interleave,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8090".parse().unwrap(),
            batch_workers: 4,
            trdos_interleave: 1,
        }
    }
}
