use anyhow::Result;
use pulseboard::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %app_config.backend.endpoint()?,
        "Starting dashboard client"
    );

    let (watch_renderer, view_rx) = view::WatchRenderer::new();
    let renderer = view::Fanout(vec![
        Box::new(watch_renderer) as Box<dyn view::Renderer>,
        Box::new(view::LogRenderer),
    ]);
    let transport = transport::WsTransport::new(Duration::from_millis(
        app_config.backend.connect_timeout_ms,
    ));
    let dashboard = context::DashboardContext::init(&app_config, transport, renderer)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let dashboard_handle = dashboard.spawn(shutdown_rx);

    if app_config.server.enabled {
        let app = routes::app(view_rx, Arc::new(AtomicUsize::new(0)));
        let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("View server listening on http://{}", addr);
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = shutdown_signal() => {
                tracing::info!("Received shutdown signal");
            }
        }
    } else {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
    }

    let _ = shutdown_tx.send(());
    let _ = dashboard_handle.await;
    Ok(())
}
