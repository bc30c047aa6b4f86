//! Google Calendar connection: consent URL, code callback, disconnect.
//!
//! The refresh token obtained on callback is encrypted with the gateway's
//! [`present_core::TokenCipher`] before it touches the store.

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use present_core::run_blocking;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
}

fn ensure_configured(state: &AppState) -> Result<(), ApiError> {
    if state.oauth.is_configured() {
        Ok(())
    } else {
        Err(ApiError::Internal(
            "Google OAuth is not configured on this server.".to_string(),
        ))
    }
}

/// GET /api/v1/google/auth-url
pub async fn auth_url(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    ensure_configured(&state)?;
    let url = state.oauth.authorization_url(&user_id)?;
    Ok(Json(serde_json::json!({ "auth_url": url })))
}

/// POST /api/v1/google/callback
pub async fn callback(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(req) = body?;
    ensure_configured(&state)?;
    if req.code.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing authorization code.".to_string()));
    }
    let tokens = state.oauth.exchange_code(req.code.trim()).await?;
    let refresh_token = tokens
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest(
                "Google did not return a refresh token. Remove the app's access in your Google account and connect again."
                    .to_string(),
            )
        })?;
    let blob = state
        .cipher
        .encrypt(&refresh_token)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let store = state.store.clone();
    let uid = user_id.clone();
    run_blocking(move || store.put_calendar_credential(&uid, &blob)).await?;
    tracing::info!(target: "present::gateway", user_id = %user_id, "Google Calendar connected");
    Ok(Json(serde_json::json!({ "status": "connected" })))
}

/// DELETE /api/v1/google/credential
pub async fn disconnect(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = state.store.clone();
    let removed = run_blocking(move || store.remove_calendar_credential(&user_id)).await?;
    Ok(Json(serde_json::json!({
        "status": if removed { "disconnected" } else { "not_connected" }
    })))
}
