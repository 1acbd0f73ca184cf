//! ZX Spectrum emulator fleet control daemon — library surface exposed for
//! OpenAPI generation (`bin/openapi_dump.rs`) and integration testing.

pub mod api;
pub mod batch;
pub mod config;
pub mod cpu;
pub mod disk;
pub mod error;
pub mod events;
pub mod instance;
pub mod manager;
pub mod memory;
pub mod peripherals;
pub mod snapshot;
pub mod tracing_layer;
