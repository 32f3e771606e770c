//! Liveness probe.

/// Returns "ok" while the process can answer HTTP.
pub async fn health() -> &'static str {
    "ok"
}
