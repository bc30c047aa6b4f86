//! Shared types used across all Present OS crates.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default Gemini model: fast, cheap, and supports JSON mode.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-09-2025";

/// OAuth scope requested from Google (read/write calendar events).
pub const GOOGLE_CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// A user-defined high-level objective. Read-only to the action pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// PAEI personality used to frame the generated task.
///
/// Parsed case-insensitively from its single-letter code. Anything else maps to
/// [`Personality::Unrecognized`], which yields a neutral prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Personality {
    /// (P)roducer: short-term effectiveness.
    Producer,
    /// (A)dministrator: short-term efficiency.
    Administrator,
    /// (E)ntrepreneur: long-term effectiveness.
    Entrepreneur,
    /// (I)ntegrator: long-term efficiency (harmony).
    Integrator,
    Unrecognized,
}

impl Personality {
    pub fn from_code(code: &str) -> Self {
        match code.to_uppercase().as_str() {
            "P" => Self::Producer,
            "A" => Self::Administrator,
            "E" => Self::Entrepreneur,
            "I" => Self::Integrator,
            _ => Self::Unrecognized,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Producer => "P",
            Self::Administrator => "A",
            Self::Entrepreneur => "E",
            Self::Integrator => "I",
            Self::Unrecognized => "",
        }
    }
}

impl From<String> for Personality {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<Personality> for String {
    fn from(p: Personality) -> Self {
        p.code().to_string()
    }
}

/// Action discriminator. Only `schedule_task` has defined behavior today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    ScheduleTask,
    /// Any other task type, kept verbatim for logging and error messages.
    Unrecognized(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ScheduleTask => "schedule_task",
            Self::Unrecognized(s) => s,
        }
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "schedule_task" => Self::ScheduleTask,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> Self {
        t.as_str().to_string()
    }
}

/// Payload of an action request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPayload {
    pub goal_id: String,
    pub task_prompt: String,
    pub personality: Personality,
}

/// Body of `POST /actions/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub task_type: TaskType,
    pub payload: ActionPayload,
}

/// Which plan shape the model is asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Model proposes `start_time_iso` (mandatory) and an optional recurrence rule.
    #[default]
    TimeAware,
    /// Legacy: model proposes a duration only; the event starts one minute from now.
    DurationOnly,
}

/// Global application configuration (gateway + providers). Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown by `/v1/status`.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Base directory for the sled store.
    pub storage_path: String,
    /// LLM mode: "mock" (deterministic local plans) or "live" (Gemini).
    pub llm_mode: String,
    #[serde(default)]
    pub plan_mode: PlanMode,

    pub gemini_model: String,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,

    #[serde(default)]
    pub google_client_id: String,
    #[serde(default)]
    pub google_client_secret: String,
    #[serde(default)]
    pub google_redirect_uri: String,
    pub google_auth_uri: String,
    pub google_token_uri: String,
    pub calendar_api_base: String,

    /// 32-byte AES-256-GCM key as 64 hex characters. Encrypts stored refresh tokens.
    #[serde(default)]
    pub token_encryption_key: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Present OS".to_string(),
            port: 8001,
            storage_path: "./data".to_string(),
            llm_mode: "mock".to_string(),
            plan_mode: PlanMode::TimeAware,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_key: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_uri: String::new(),
            google_auth_uri: DEFAULT_GOOGLE_AUTH_URI.to_string(),
            google_token_uri: DEFAULT_GOOGLE_TOKEN_URI.to_string(),
            calendar_api_base: DEFAULT_CALENDAR_API_BASE.to_string(),
            token_encryption_key: String::new(),
        }
    }
}

impl CoreConfig {
    /// Sled database path derived from `storage_path`.
    pub fn store_path(&self) -> std::path::PathBuf {
        Path::new(&self.storage_path).join("present_store")
    }

    /// Load config from file and environment. Precedence: env `PRESENT__*`
    /// (e.g. `PRESENT__GEMINI_API_KEY`) > `PRESENT_CONFIG` path (default `config/gateway.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("PRESENT_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Present OS")?
            .set_default("port", 8001_i64)?
            .set_default("storage_path", "./data")?
            .set_default("llm_mode", "mock")?
            .set_default("plan_mode", "time_aware")?
            .set_default("gemini_model", DEFAULT_GEMINI_MODEL)?
            .set_default("gemini_api_base", DEFAULT_GEMINI_API_BASE)?
            .set_default("google_auth_uri", DEFAULT_GOOGLE_AUTH_URI)?
            .set_default("google_token_uri", DEFAULT_GOOGLE_TOKEN_URI)?
            .set_default("calendar_api_base", DEFAULT_CALENDAR_API_BASE)?;

        // config::File::with_name resolves the extension (gateway -> gateway.toml).
        let path = Path::new(&config_path);
        let builder = if path.exists() || path.with_extension("toml").exists() {
            builder.add_source(config::File::with_name(&config_path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("PRESENT").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
