use serde::Deserialize;
use url::Url;

use crate::controller::MissingFieldPolicy;
use crate::models::MetricKind;

/// Well-known path of the backend's metrics channel.
pub const ENDPOINT_PATH: &str = "/ws";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub polling: PollingConfig,
    pub reconnect: ReconnectConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// host[:port] of the monitoring backend (the dashboard page's host).
    pub host: String,
    /// Use wss:// instead of ws://.
    pub secure: bool,
    /// Upper bound on one connect attempt; a hung attempt counts as a failure.
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:8000".into(),
            secure: false,
            connect_timeout_ms: 10_000,
        }
    }
}

impl BackendConfig {
    /// `ws://{host}/ws` (or `wss://`).
    pub fn endpoint(&self) -> anyhow::Result<Url> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let url = Url::parse(&format!("{scheme}://{}{ENDPOINT_PATH}", self.host))
            .map_err(|e| anyhow::anyhow!("backend.host {:?} is not a valid host: {}", self.host, e))?;
        anyhow::ensure!(
            url.host().is_some(),
            "backend.host {:?} has no host part",
            self.host
        );
        Ok(url)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Fixed delay between a disconnect and the next attempt.
    pub delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self { delay_ms: 5000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Points kept per series.
    pub capacity: usize,
    /// Tracked series, in display order.
    pub series: Vec<String>,
    pub missing_fields: MissingFieldPolicy,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: crate::history::DEFAULT_CAPACITY,
            series: MetricKind::ALL
                .iter()
                .map(|k| k.series_name().to_string())
                .collect(),
            missing_fields: MissingFieldPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the current view over HTTP/WS for browser renderers.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 8090,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// Bound of the transport event queue (transport tasks wait when it is full).
    pub event_channel_capacity: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Reads `$CONFIG_FILE`, or `config.toml` when unset. A missing default file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(&path),
            Err(_) if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_path(DEFAULT_CONFIG_PATH)
            }
            Err(_) => {
                tracing::info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Configured series as kinds, in order.
    pub fn tracked_series(&self) -> anyhow::Result<Vec<MetricKind>> {
        self.history
            .series
            .iter()
            .map(|name| {
                MetricKind::from_series_name(name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "history.series: unknown series {:?} (expected cpu, memory or disk)",
                        name
                    )
                })
            })
            .collect()
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.backend.host.trim().is_empty(),
            "backend.host must be non-empty"
        );
        self.backend.endpoint()?;
        anyhow::ensure!(
            self.backend.connect_timeout_ms > 0,
            "backend.connect_timeout_ms must be > 0, got {}",
            self.backend.connect_timeout_ms
        );
        anyhow::ensure!(
            self.polling.interval_ms > 0,
            "polling.interval_ms must be > 0, got {}",
            self.polling.interval_ms
        );
        anyhow::ensure!(
            self.reconnect.delay_ms > 0,
            "reconnect.delay_ms must be > 0, got {}",
            self.reconnect.delay_ms
        );
        anyhow::ensure!(
            self.history.capacity > 0,
            "history.capacity must be > 0, got {}",
            self.history.capacity
        );
        anyhow::ensure!(
            !self.history.series.is_empty(),
            "history.series must list at least one series"
        );
        let kinds = self.tracked_series()?;
        for (i, kind) in kinds.iter().enumerate() {
            anyhow::ensure!(
                !kinds[..i].contains(kind),
                "history.series: {} listed twice",
                kind
            );
        }
        anyhow::ensure!(
            self.publishing.event_channel_capacity > 0,
            "publishing.event_channel_capacity must be > 0, got {}",
            self.publishing.event_channel_capacity
        );
        if self.server.enabled {
            anyhow::ensure!(
                self.server.port > 0,
                "server.port must be between 1 and 65535, got {}",
                self.server.port
            );
            anyhow::ensure!(
                !self.server.host.is_empty(),
                "server.host must be non-empty"
            );
        }
        Ok(())
    }
}
