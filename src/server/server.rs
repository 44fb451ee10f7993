use std::future::Future;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
}

impl AppState {
    pub fn new(metrics: &Metrics) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
        }
    }
}

pub async fn router(settings_config: &SettingsConfig) -> Router {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics);

    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serve the metrics route until `shutdown` resolves. Returns right away when
/// no route is enabled.
pub async fn start<S>(settings_config: &SettingsConfig, shutdown: S) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let metrics = get_metrics().await;
    let app = router(settings_config).await;

    if !app.has_routes() {
        info!("metrics endpoint disabled, http server not started");
        return Ok(());
    }

    let address = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("serving {} on {}", settings_config.metrics.path, address);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")?;
    metrics.up.set(0);

    Ok(())
}
