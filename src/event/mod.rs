//! Alert types and the queue that carries them to the notification worker

mod event_types;
pub mod queue;

pub use event_types::{Alert, AlertKind, AlertPayload, Severity};
pub use queue::{alert_channel, AlertQueue};
