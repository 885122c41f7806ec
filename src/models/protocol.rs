// JSON-over-WebSocket protocol: tagged inbound messages, outbound requests

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ServiceStatus, SystemMetricsSnapshot};
use crate::error::ProtocolError;

pub const METRICS_UPDATE: &str = "metrics_update";

/// Messages the dashboard sends to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    GetMetrics,
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of a `metrics_update`. Absent parts leave the matching dashboard state untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsUpdate {
    #[serde(default)]
    pub system: Option<SystemMetricsSnapshot>,
    #[serde(default)]
    pub services: Option<BTreeMap<String, ServiceStatus>>,
}

/// Decoded inbound message. Unknown tags decode to [`InboundMessage::Unknown`] so newer
/// backends can add message types without breaking older dashboards.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    MetricsUpdate(MetricsUpdate),
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

/// Decode one text frame. Only the payload of recognised types is validated.
pub fn decode(raw: &str) -> Result<InboundMessage, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    let kind = envelope.kind.ok_or(ProtocolError::MissingType)?;
    match kind.as_str() {
        METRICS_UPDATE => {
            let mut update: MetricsUpdate = if envelope.data.is_null() {
                MetricsUpdate::default()
            } else {
                serde_json::from_value(envelope.data)
                    .map_err(|source| ProtocolError::Payload { kind, source })?
            };
            if let Some(services) = update.services.as_mut() {
                for (name, status) in services.iter_mut() {
                    if status.name.is_empty() {
                        status.name.clone_from(name);
                    }
                }
            }
            Ok(InboundMessage::MetricsUpdate(update))
        }
        _ => Ok(InboundMessage::Unknown(kind)),
    }
}
