//! Completion providers: Gemini `generateContent` in JSON mode (live) or a
//! deterministic local planner (mock).

use chrono::{DurationRound, SecondsFormat, TimeDelta, Utc};
use present_core::{CompletionProvider, CoreConfig, GenerationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mode for plan generation: mock (deterministic local plans) or live (Gemini API).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    #[default]
    Mock,
    Live,
}

impl LlmMode {
    pub fn from_config(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "live" => LlmMode::Live,
            _ => LlmMode::Mock,
        }
    }
}

/// Builds the completion provider selected by `llm_mode`. Live mode without an API key
/// falls back to mock.
pub fn completion_provider(config: &CoreConfig) -> Arc<dyn CompletionProvider> {
    match (LlmMode::from_config(&config.llm_mode), config.gemini_api_key.as_deref()) {
        (LlmMode::Live, Some(key)) if !key.trim().is_empty() => Arc::new(GeminiCompletion::new(
            &config.gemini_api_base,
            &config.gemini_model,
            key,
        )),
        (LlmMode::Live, _) => {
            tracing::warn!(
                target: "present::skills",
                "llm_mode=live but gemini_api_key is not set; using mock plans"
            );
            Arc::new(MockCompletion)
        }
        (LlmMode::Mock, _) => Arc::new(MockCompletion),
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Gemini client bound to one model in JSON-only output mode.
pub struct GeminiCompletion {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiCompletion {
    pub fn new(api_base: &str, model: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/{}:generateContent",
                api_base.trim_end_matches('/'),
                model_path(model)
            ),
            api_key: api_key.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn build_request(system_instruction: &str, user_text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part {
                text: user_text.to_string(),
            }],
        }],
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_instruction.to_string(),
            }],
        },
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
        },
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    if let Some(err) = response.error {
        return Err(GenerationError::Provider(err.message));
    }
    let text = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GenerationError::Provider("No response from Gemini".into()));
    }
    Ok(text)
}

#[async_trait::async_trait]
impl CompletionProvider for GeminiCompletion {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete_json(
        &self,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<String, GenerationError> {
        let body = build_request(system_instruction, user_text);
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;
        let parsed: Result<GenerateContentResponse, _> = serde_json::from_str(&text);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            tracing::warn!(
                target: "present::skills",
                status = status.as_u16(),
                "Gemini request failed: {}",
                message
            );
            return Err(GenerationError::Provider(message));
        }

        let parsed = parsed.map_err(|e| GenerationError::Provider(e.to_string()))?;
        extract_text(parsed)
    }
}

const START_TIME_KEY: &str = "start_time_iso";

/// Deterministic offline planner: echoes the task as a 30-minute event.
///
/// When the system instruction asks for `start_time_iso`, the plan starts at the next
/// full hour and may carry a recurrence; otherwise it is duration-only.
pub struct MockCompletion;

impl MockCompletion {
    fn mock_plan(&self, system_instruction: &str, user_text: &str) -> serde_json::Value {
        let task = user_text.strip_prefix("Task:").unwrap_or(user_text).trim();
        let goal = system_instruction
            .lines()
            .find_map(|l| l.trim().strip_prefix("GOAL NAME:"))
            .map(str::trim)
            .unwrap_or("your goal");
        let title = task.chars().take(60).collect::<String>();

        let mut plan = serde_json::json!({
            "title": if title.is_empty() { "Focus block".to_string() } else { title },
            "description": format!("[Generated – Mock LLM] A step toward your goal: {}.", goal),
            "duration_minutes": 30,
        });
        if !system_instruction.contains(START_TIME_KEY) {
            return plan;
        }

        let start = Utc::now()
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or_else(|_| Utc::now())
            + TimeDelta::hours(1);
        plan[START_TIME_KEY] = serde_json::json!(start.to_rfc3339_opts(SecondsFormat::Secs, true));

        let lower = task.to_lowercase();
        let rrule = if lower.contains("every day") || lower.contains("daily") {
            Some("FREQ=DAILY;COUNT=7")
        } else if lower.contains("every week") || lower.contains("weekly") {
            Some("FREQ=WEEKLY;COUNT=4")
        } else {
            None
        };
        if let Some(rule) = rrule {
            plan["recurrence_rrule"] = serde_json::json!(rule);
        }
        plan
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MockCompletion {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete_json(
        &self,
        system_instruction: &str,
        user_text: &str,
    ) -> Result<String, GenerationError> {
        Ok(self.mock_plan(system_instruction, user_text).to_string())
    }
}
