// Service status rows as reported by the backend's health checks

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Epoch values above this are taken as milliseconds, below as seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Up or down. Anything the backend sends other than exactly "UP" ("DOWN", "ERROR", null, ...)
/// reads as down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceState {
    Up,
    #[default]
    Down,
}

impl ServiceState {
    pub fn from_backend(s: &str) -> Self {
        if s == "UP" {
            ServiceState::Up
        } else {
            ServiceState::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Up => "UP",
            ServiceState::Down => "DOWN",
        }
    }
}

impl<'de> Deserialize<'de> for ServiceState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => Self::from_backend(&s),
            _ => ServiceState::Down,
        })
    }
}

/// One service's latest health check. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Filled from the map key when the payload omits it.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ServiceState,
    #[serde(default)]
    pub response_time: Option<f64>,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_last_check")]
    pub last_check: Option<DateTime<Utc>>,
}

impl ServiceStatus {
    pub fn is_up(&self) -> bool {
        self.status == ServiceState::Up
    }
}

fn deserialize_last_check<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let parsed = match &raw {
        Some(serde_json::Value::String(s)) => parse_last_check(s),
        Some(serde_json::Value::Number(n)) => n.as_f64().and_then(from_epoch),
        _ => None,
    };
    if parsed.is_none()
        && let Some(value) = raw.filter(|v| !v.is_null())
    {
        tracing::debug!(last_check = %value, "unparseable last_check, showing as absent");
    }
    Ok(parsed)
}

/// Parse a `last_check` string: RFC 3339, naive ISO 8601 (local time) or a numeric epoch.
pub fn parse_last_check(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    raw.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    if value > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let secs = value.trunc() as i64;
        let nanos = (value.fract() * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}
