//! present-core: goals, PAEI prompting, plan validation, time resolution and the
//! action pipeline that ties the goal store, completion provider and calendar together.

mod calendar;
mod crypto;
mod error;
mod orchestrator;
mod plan;
mod prompt;
mod schedule;
mod shared;
mod store;

pub use shared::{
    ActionPayload, ActionRequest, CoreConfig, Goal, Personality, PlanMode, TaskType,
    DEFAULT_GEMINI_MODEL, GOOGLE_CALENDAR_SCOPE,
};

pub use error::{ActionError, CalendarError, GenerationError, StoreError};

pub use prompt::{base_prompt, build_system_prompt, personality_block};
pub use plan::{CompletionProvider, GeneratedPlan, PlanGenerator};
pub use schedule::{parse_start_time, resolve, resolve_at, ResolvedWindow, FALLBACK_LEAD_MINUTES};
pub use calendar::{CalendarEvent, CalendarMaterializer, CalendarProvider, CreatedEvent, EventDateTime};

pub use crypto::{CipherError, TokenCipher};
pub use store::{run_blocking, CredentialStore, GoalStore, SledStore};

pub use orchestrator::{ActionOrchestrator, ScheduledAction};
