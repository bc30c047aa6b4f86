//! Plan generation: asks the completion provider for a structured task plan and
//! validates the loosely-typed JSON that comes back.

use crate::error::GenerationError;
use crate::prompt::build_system_prompt;
use crate::shared::{Goal, Personality, PlanMode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

const REQUIRED_KEYS: [&str; 3] = ["title", "description", "duration_minutes"];
const START_TIME_KEY: &str = "start_time_iso";
const RRULE_KEY: &str = "recurrence_rrule";

/// A generative text service that returns raw JSON text (JSON-only output mode).
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs (e.g. "gemini", "mock").
    fn name(&self) -> &str;

    async fn complete_json(
        &self,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<String, GenerationError>;
}

/// A validated plan. Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPlan {
    pub title: String,
    pub description: String,
    pub duration_minutes: i64,
    pub start_time_iso: Option<String>,
    /// RRULE body without the `RRULE:` prefix.
    pub recurrence_rrule: Option<String>,
}

impl GeneratedPlan {
    /// Parses and validates raw model output.
    pub fn parse(raw: &str, mode: PlanMode) -> Result<Self, GenerationError> {
        let value: Value = serde_json::from_str(raw)?;
        let obj = value.as_object().ok_or(GenerationError::NotAnObject)?;

        let mut missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|k| !obj.contains_key(*k))
            .collect();
        if mode == PlanMode::TimeAware && !obj.contains_key(START_TIME_KEY) {
            missing.push(START_TIME_KEY);
        }
        if !missing.is_empty() {
            return Err(GenerationError::MissingKeys(missing));
        }

        Ok(Self {
            title: text_field(obj, "title"),
            description: text_field(obj, "description"),
            duration_minutes: coerce_minutes(&obj["duration_minutes"])?,
            start_time_iso: optional_text(obj, START_TIME_KEY),
            recurrence_rrule: optional_text(obj, RRULE_KEY).and_then(|r| normalize_rrule(&r)),
        })
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match &obj[key] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts an integer, a float (truncated toward zero) or a numeric string.
fn coerce_minutes(value: &Value) -> Result<i64, GenerationError> {
    let invalid = || GenerationError::InvalidDuration(value.to_string());
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn normalize_rrule(rule: &str) -> Option<String> {
    let body = match rule.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &rule[6..],
        _ => rule,
    };
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}

/// Scheduling directive appended to the PAEI prompt in time-aware mode.
fn timing_directive(now: DateTime<Utc>) -> String {
    format!(
        "
The current date and time is {now} (UTC).
You MUST also include 'start_time_iso': the ISO-8601 start time with a UTC offset
(e.g. 2025-01-01T10:00:00Z) that best fits the task. Never propose a time in the past.
If the task repeats, include 'recurrence_rrule': an iCalendar RRULE without the 'RRULE:' prefix
(e.g. FREQ=WEEKLY;BYDAY=MO,WE;COUNT=8). Omit it for one-off tasks.
",
        now = now.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Produces validated plans from a completion provider. Never retries, never caches.
pub struct PlanGenerator {
    provider: Arc<dyn CompletionProvider>,
    mode: PlanMode,
}

impl PlanGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, mode: PlanMode) -> Self {
        Self { provider, mode }
    }

    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    /// Full system instruction sent to the provider.
    pub fn system_instruction(&self, personality: Personality, goal: &Goal) -> String {
        let mut instruction = build_system_prompt(personality, goal);
        if self.mode == PlanMode::TimeAware {
            instruction.push_str(&timing_directive(Utc::now()));
        }
        instruction
    }

    pub async fn generate(
        &self,
        task_prompt: &str,
        goal: &Goal,
        personality: Personality,
    ) -> Result<GeneratedPlan, GenerationError> {
        let system_instruction = self.system_instruction(personality, goal);
        let user_text = format!("Task: {}", task_prompt);

        let raw = self
            .provider
            .complete_json(&system_instruction, &user_text)
            .await?;
        let plan = GeneratedPlan::parse(&raw, self.mode).map_err(|e| {
            tracing::warn!(
                target: "present::plan",
                provider = self.provider.name(),
                error = %e,
                "Rejected plan from completion provider"
            );
            e
        })?;

        tracing::debug!(
            target: "present::plan",
            provider = self.provider.name(),
            title = %plan.title,
            duration_minutes = plan.duration_minutes,
            has_start_time = plan.start_time_iso.is_some(),
            has_recurrence = plan.recurrence_rrule.is_some(),
            "Plan generated"
        );
        Ok(plan)
    }
}
