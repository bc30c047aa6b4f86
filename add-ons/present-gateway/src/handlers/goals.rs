//! Goal management for the caller: create, fetch, list.

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use present_core::{run_blocking, Goal, GoalStore};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/v1/goals
pub async fn create_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<CreateGoalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Goal>), ApiError> {
    let Json(req) = body?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Goal name must not be empty.".to_string()));
    }
    let goal = Goal {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        avatar: non_empty(req.avatar),
        description: non_empty(req.description),
    };
    let store = state.store.clone();
    let stored = goal.clone();
    run_blocking(move || store.put_goal(&user_id, &stored)).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// GET /api/v1/goals
pub async fn list_goals(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<Goal>>, ApiError> {
    let store = state.store.clone();
    let goals = run_blocking(move || store.list_goals(&user_id)).await?;
    Ok(Json(goals))
}

/// GET /api/v1/goals/:goal_id
pub async fn get_goal(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(goal_id): Path<String>,
) -> Result<Json<Goal>, ApiError> {
    let store = state.store.clone();
    run_blocking(move || store.get_goal(&user_id, &goal_id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Goal not found.".to_string()))
}
