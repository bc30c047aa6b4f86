//! `POST /actions/`: runs one action request through the orchestrator.

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use present_core::{ActionRequest, ScheduledAction};

pub async fn create_action(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScheduledAction>), ApiError> {
    let Json(req) = body?;
    let scheduled = state.orchestrator.execute(&user_id, &req).await?;
    tracing::info!(
        target: "present::gateway",
        user_id = %user_id,
        event_title = %scheduled.event_title,
        "Action completed"
    );
    Ok((StatusCode::CREATED, Json(scheduled)))
}
