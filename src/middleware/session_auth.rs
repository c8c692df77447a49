use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;
use crate::util::{extract_bearer_token, key_matches, key_prefix};

/// Authenticated caller of the tracking API.
#[derive(Debug, Clone)]
pub struct TrackSession {
    /// Visible prefix of the API key used (never the full key)
    pub key_prefix: String,
}

/// Require a configured bearer key before the request body is touched.
pub async fn track_session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthorized)?;

    if !key_matches(&state.track_api_keys, token) {
        tracing::debug!("Rejected tracking request with unknown key {}", key_prefix(token));
        return Err(AppError::Unauthorized);
    }

    let session = TrackSession {
        key_prefix: key_prefix(token),
    };
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}
