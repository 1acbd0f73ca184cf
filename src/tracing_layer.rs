//! Tracing layer that re-broadcasts ERROR/WARN/INFO log events onto the
//! WebSocket event bus as `CoreEvent::LogLine`, so a connected client sees
//! server-side log activity alongside state-change events.

use crate::events::{CoreEvent, EventBus};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub struct WebSocketLayer {
    bus: EventBus,
}

impl WebSocketLayer {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl<S> Layer<S> for WebSocketLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "debug",
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Some(msg) = visitor.message {
            let target = event.metadata().target();
            let source = if target.contains("batch") {
                "batch"
            } else if target.contains("instance") || target.contains("manager") {
                "emulator"
            } else {
                "zxdaemon"
            };

            self.bus.publish(CoreEvent::LogLine {
                level: level.to_string(),
                source: source.to_string(),
                msg,
                ts: chrono::Utc::now().timestamp_millis(),
            });
        }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}
