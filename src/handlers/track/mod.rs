mod sale;

pub use sale::*;

use axum::{Router, middleware, routing::post};

use crate::middleware::track_session_auth;
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/track/sale", post(track_sale))
        .layer(middleware::from_fn_with_state(state, track_session_auth))
}
