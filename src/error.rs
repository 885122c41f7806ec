// Error taxonomy for the dashboard core

use thiserror::Error;

/// Transport failures. Always recovered by the reconnect loop, never surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out after {0} ms")]
    Timeout(u64),
    #[error("send failed: {0}")]
    Send(String),
    #[error("no open connection")]
    NotConnected,
    #[error("connection lost: {0}")]
    Closed(String),
}

/// Malformed inbound payloads. The message is dropped and no state changes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no \"type\" field")]
    MissingType,
    #[error("invalid {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// History buffer errors. Construction errors are fatal at init.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("unknown series {0:?}")]
    UnknownSeries(String),
    #[error("series {0:?} configured twice")]
    DuplicateSeries(String),
    #[error("at least one series must be configured")]
    NoSeries,
    #[error("history capacity must be > 0")]
    ZeroCapacity,
}
