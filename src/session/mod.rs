//! UI bridge sessions and their lifecycle

pub mod model;
pub mod registry;

pub use model::{ContextOperation, TransportKey, UiNotification, UiSession};
pub use registry::{Delivery, NotificationSink, OutboundNotification, TracingSink, UiSessionRegistry};
