//! Action pipeline: goal lookup → AI plan → dispatch → calendar materialization.
//!
//! One linear pass per request with no shared mutable state. The four external
//! calls (goal fetch, completion, credential fetch, calendar create) run strictly
//! in that order; blocking store calls are moved onto the blocking thread pool.

use crate::calendar::CalendarMaterializer;
use crate::crypto::TokenCipher;
use crate::error::{ActionError, CalendarError};
use crate::plan::{GeneratedPlan, PlanGenerator};
use crate::schedule;
use crate::shared::{ActionRequest, Goal, TaskType};
use crate::store::{run_blocking, CredentialStore, GoalStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SCHEDULED_MESSAGE: &str = "Task scheduled successfully";

/// Successful outcome of a `schedule_task` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    pub message: String,
    pub event_title: String,
    pub event_link: String,
    pub recurrence_applied: bool,
}

/// Entry point of the action pipeline.
pub struct ActionOrchestrator {
    goals: Arc<dyn GoalStore>,
    credentials: Arc<dyn CredentialStore>,
    cipher: Arc<TokenCipher>,
    planner: PlanGenerator,
    calendar: CalendarMaterializer,
}

impl ActionOrchestrator {
    pub fn new(
        goals: Arc<dyn GoalStore>,
        credentials: Arc<dyn CredentialStore>,
        cipher: Arc<TokenCipher>,
        planner: PlanGenerator,
        calendar: CalendarMaterializer,
    ) -> Self {
        Self {
            goals,
            credentials,
            cipher,
            planner,
            calendar,
        }
    }

    pub fn planner(&self) -> &PlanGenerator {
        &self.planner
    }

    /// Executes one action request on behalf of `user_id`.
    pub async fn execute(
        &self,
        user_id: &str,
        request: &ActionRequest,
    ) -> Result<ScheduledAction, ActionError> {
        let payload = &request.payload;
        tracing::info!(
            target: "present::orchestrator",
            user_id = user_id,
            task_type = request.task_type.as_str(),
            goal_id = %payload.goal_id,
            "Action started"
        );

        let goal = self.fetch_goal(user_id, &payload.goal_id).await?;

        let plan = self
            .planner
            .generate(&payload.task_prompt, &goal, payload.personality)
            .await
            .map_err(|e| {
                tracing::error!(target: "present::orchestrator", error = %e, "Error in AI service");
                ActionError::Generation(e)
            })?;

        match &request.task_type {
            TaskType::ScheduleTask => self.schedule_task(user_id, &plan).await,
            TaskType::Unrecognized(other) => {
                tracing::warn!(
                    target: "present::orchestrator",
                    task_type = %other,
                    "No handler for task type"
                );
                Err(ActionError::Unhandled)
            }
        }
    }

    async fn fetch_goal(&self, user_id: &str, goal_id: &str) -> Result<Goal, ActionError> {
        let store = Arc::clone(&self.goals);
        let (uid, gid) = (user_id.to_string(), goal_id.to_string());
        let goal = run_blocking(move || store.get_goal(&uid, &gid))
            .await
            .map_err(|e| {
                tracing::error!(target: "present::orchestrator", error = %e, "Error fetching goal");
                ActionError::Internal(format!("Error fetching goal: {}", e))
            })?;
        goal.ok_or(ActionError::GoalNotFound)
    }

    async fn schedule_task(
        &self,
        user_id: &str,
        plan: &GeneratedPlan,
    ) -> Result<ScheduledAction, ActionError> {
        let store = Arc::clone(&self.credentials);
        let uid = user_id.to_string();
        let encrypted = run_blocking(move || store.get_calendar_credential(&uid))
            .await
            .map_err(|e| {
                tracing::error!(target: "present::orchestrator", error = %e, "Error fetching calendar credential");
                ActionError::Internal(format!("Failed to create calendar event: {}", e))
            })?
            .ok_or_else(|| {
                ActionError::Unauthorized("User has not authorized Google Calendar.".to_string())
            })?;

        let refresh_token = self.cipher.decrypt(&encrypted).ok_or_else(|| {
            tracing::warn!(target: "present::orchestrator", user_id = user_id, "Stored calendar token failed to decrypt");
            ActionError::Unauthorized("Could not decrypt calendar token.".to_string())
        })?;

        if plan.title.trim().is_empty() {
            return Err(ActionError::Internal(
                "AI failed to return valid event data.".to_string(),
            ));
        }

        let window = schedule::resolve(plan);
        let rrule = plan.recurrence_rrule.as_deref();

        let created = self
            .calendar
            .create(&refresh_token, &plan.title, &plan.description, &window, rrule)
            .await
            .map_err(|e| {
                tracing::error!(target: "present::orchestrator", error = %e, "Error creating calendar event");
                match e {
                    CalendarError::Provider(reason) => ActionError::Provider(reason),
                    CalendarError::Transport(msg) => {
                        ActionError::Internal(format!("Failed to create calendar event: {}", msg))
                    }
                }
            })?;

        tracing::info!(
            target: "present::orchestrator",
            user_id = user_id,
            start = %window.start_time,
            end = %window.end_time,
            "Task scheduled"
        );

        Ok(ScheduledAction {
            message: SCHEDULED_MESSAGE.to_string(),
            event_title: created.summary,
            event_link: created.html_link,
            recurrence_applied: rrule.is_some(),
        })
    }
}

#[cfg(test)]
mod tests;
