//! System information endpoint.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;
use crate::system::{self, Information};

/// Information about the host the daemon runs on.
pub async fn information(State(state): State<AppState>) -> Json<Information> {
    Json(system::information(&state.config.system.timezone))
}
