// Domain and wire models for the monitoring backend channel

mod metrics;
mod protocol;
mod service;

pub use metrics::{MetricKind, MetricSample, SystemMetricsSnapshot};
pub use protocol::{InboundMessage, MetricsUpdate, OutboundMessage, decode};
pub use service::{ServiceState, ServiceStatus, parse_last_check};
