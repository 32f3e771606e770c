//! Diagnostics endpoint.
//!
//! When enabled, a small HTTP server on `localhost:<port>` publishes the
//! contention sampling rates and runtime statistics. It runs as a supervised
//! task: a bind failure is logged and the primary listener carries on.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_PPROF_PORT;
use crate::supervisor::{SupervisedTask, TaskHandle};

/// Sample one in this many mutex contention events (1%)
pub const MUTEX_PROFILE_FRACTION: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilerSettings {
    pub enabled: bool,
    /// Block profiling rate; zero leaves block profiling off
    pub block_rate: u32,
    pub port: u16,
}

impl Default for ProfilerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            block_rate: 0,
            port: DEFAULT_PPROF_PORT,
        }
    }
}

impl ProfilerSettings {
    /// Loopback address of the diagnostics endpoint
    pub fn address(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }
}

/// Contention sampling rates in effect for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplingRates {
    pub block_profile_rate: Option<u32>,
    pub mutex_profile_fraction: u32,
}

impl SamplingRates {
    pub fn from_settings(settings: &ProfilerSettings) -> Self {
        Self {
            block_profile_rate: (settings.block_rate > 0).then_some(settings.block_rate),
            mutex_profile_fraction: MUTEX_PROFILE_FRACTION,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    #[error("Failed to bind diagnostics endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Diagnostics endpoint failed: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Clone)]
struct DiagnosticsState {
    rates: SamplingRates,
    started: Instant,
}

#[derive(Serialize)]
struct IndexReport {
    sampling: SamplingRates,
    uptime_secs: u64,
    profiles: &'static [&'static str],
}

#[derive(Serialize)]
struct RuntimeReport {
    flavor: String,
    workers: usize,
    alive_tasks: usize,
}

pub fn diagnostics_router(rates: SamplingRates) -> Router {
    let state = DiagnosticsState {
        rates,
        started: Instant::now(),
    };
    Router::new()
        .route("/debug/pprof/", get(index))
        .route("/debug/pprof/runtime", get(runtime))
        .with_state(state)
}

async fn index(State(state): State<DiagnosticsState>) -> Json<IndexReport> {
    Json(IndexReport {
        sampling: state.rates,
        uptime_secs: state.started.elapsed().as_secs(),
        profiles: &["runtime"],
    })
}

async fn runtime() -> Json<RuntimeReport> {
    let handle = tokio::runtime::Handle::current();
    let metrics = handle.metrics();
    Json(RuntimeReport {
        flavor: format!("{:?}", handle.runtime_flavor()),
        workers: metrics.num_workers(),
        alive_tasks: metrics.num_alive_tasks(),
    })
}

/// Bind and serve the diagnostics endpoint until `cancel` fires.
pub async fn serve(
    settings: ProfilerSettings,
    cancel: CancellationToken,
) -> Result<(), ProfilerError> {
    let rates = SamplingRates::from_settings(&settings);
    if let Some(rate) = rates.block_profile_rate {
        tracing::info!(rate, "block profiling enabled");
    }
    tracing::debug!(fraction = rates.mutex_profile_fraction, "mutex contention sampling set");

    let addr = settings.address();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ProfilerError::Bind { addr, source })?;
    tracing::info!(%addr, "diagnostics endpoint listening");

    axum::serve(listener, diagnostics_router(rates))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(ProfilerError::Serve)
}

/// Start the diagnostics endpoint as a supervised task. Fire-and-forget.
pub fn start(settings: ProfilerSettings, parent: &CancellationToken) -> Option<TaskHandle> {
    SupervisedTask::new("profiler", settings.enabled)
        .spawn(parent, move |cancel| serve(settings, cancel))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::supervisor::TaskOutcome;

    #[test]
    fn test_block_rate_only_when_positive() {
        let off = SamplingRates::from_settings(&ProfilerSettings::default());
        assert_eq!(off.block_profile_rate, None);
        assert_eq!(off.mutex_profile_fraction, 100);

        let on = SamplingRates::from_settings(&ProfilerSettings {
            enabled: true,
            block_rate: 5,
            port: 6060,
        });
        assert_eq!(on.block_profile_rate, Some(5));
    }

    #[test]
    fn test_address_is_loopback() {
        let settings = ProfilerSettings::default();
        assert_eq!(settings.address(), "127.0.0.1:6060".parse().unwrap());
    }

    #[tokio::test]
    async fn test_disabled_profiler_does_not_start() {
        let root = CancellationToken::new();
        assert!(start(ProfilerSettings::default(), &root).is_none());
    }

    #[tokio::test]
    async fn test_bind_failure_is_contained() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let root = CancellationToken::new();
        let handle = start(
            ProfilerSettings {
                enabled: true,
                block_rate: 0,
                port,
            },
            &root,
        )
        .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
        assert_eq!(outcome, TaskOutcome::Failed);
    }

    #[tokio::test]
    async fn test_index_reports_sampling_rates() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let rates = SamplingRates {
            block_profile_rate: Some(3),
            mutex_profile_fraction: MUTEX_PROFILE_FRACTION,
        };
        tokio::spawn(async move {
            axum::serve(listener, diagnostics_router(rates)).await.unwrap();
        });

        let body: serde_json::Value = reqwest::get(format!("http://{addr}/debug/pprof/"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["sampling"]["block_profile_rate"], 3);
        assert_eq!(body["sampling"]["mutex_profile_fraction"], 100);

        let runtime: serde_json::Value = reqwest::get(format!("http://{addr}/debug/pprof/runtime"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(runtime["workers"].as_u64().unwrap() >= 1);
        assert!(runtime["alive_tasks"].as_u64().unwrap() >= 1);
    }
}
