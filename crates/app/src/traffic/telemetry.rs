//! Tracing subscriber and Prometheus recorder setup.

use std::{sync::OnceLock, thread, time::Duration};

use anyhow::{Result, anyhow};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global tracing subscriber. `RUST_LOG` wins over `verbose`.
pub(crate) fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_filter(env_filter),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

/// Install the global metrics recorder once and return its handle.
pub(crate) fn init_metrics_recorder() -> Result<&'static PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle);
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|err| anyhow!("metrics recorder already installed: {err}"))?;

    let upkeep_handle = handle.clone();
    thread::Builder::new()
        .name("prometheus-upkeep".into())
        .spawn(move || {
            loop {
                thread::sleep(Duration::from_secs(5));
                upkeep_handle.run_upkeep();
            }
        })?;

    Ok(PROM_HANDLE.get_or_init(|| handle))
}
