//! Concrete providers behind the core traits: Gemini completions and Google Calendar.

pub use present_core::{CalendarProvider, CompletionProvider};

mod gemini;
mod google;

pub use gemini::{completion_provider, GeminiCompletion, LlmMode, MockCompletion};
pub use google::{google_error_reason, GoogleCalendar, GoogleOAuth, OAuthTokens};
