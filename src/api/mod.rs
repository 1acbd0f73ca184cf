//! Control-Plane API Surface: REST + WebSocket adapter over the core.

pub mod batch_handlers;
pub mod debug_handlers;
pub mod disk_handlers;
pub mod emulator_handlers;
pub mod health_handlers;
pub mod middleware;
pub mod routes;
pub mod snapshot_handlers;
pub mod state_handlers;
pub mod tape_handlers;
pub mod ws;

use std::sync::Arc;

use crate::batch::BatchDispatcher;
use crate::events::EventBus;
use crate::manager::EmulatorManager;

pub use routes::create_router;

/// Shared state every handler draws on: the emulator manager, the batch
/// dispatcher, and the event bus, threaded through axum as one struct.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<EmulatorManager>,
    pub dispatcher: Arc<BatchDispatcher>,
    pub bus: EventBus,
}
