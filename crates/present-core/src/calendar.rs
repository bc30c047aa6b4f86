//! Calendar materialization: turns a plan and its resolved window into a
//! created event through a [`CalendarProvider`].

use crate::error::CalendarError;
use crate::schedule::ResolvedWindow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Start or end of an event, anchored to UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    /// RFC 3339 timestamp.
    pub date_time: String,
    pub time_zone: String,
}

impl EventDateTime {
    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self {
            date_time: instant.to_rfc3339_opts(SecondsFormat::Secs, false),
            time_zone: "UTC".to_string(),
        }
    }
}

/// Event record in the calendar provider's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    /// `["RRULE:..."]` for recurring events; omitted entirely otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
}

impl CalendarEvent {
    pub fn new(
        title: &str,
        description: &str,
        window: &ResolvedWindow,
        recurrence_rrule: Option<&str>,
    ) -> Self {
        Self {
            summary: title.to_string(),
            description: description.to_string(),
            start: EventDateTime::utc(window.start_time),
            end: EventDateTime::utc(window.end_time),
            recurrence: recurrence_rrule.map(|rule| vec![format!("RRULE:{}", rule)]),
        }
    }
}

/// Event as returned by the provider after insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub html_link: String,
}

/// Scheduling API: OAuth2 refresh-token exchange plus event insertion.
#[async_trait::async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Exchanges a long-lived refresh token for a short-lived access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, CalendarError>;

    /// Inserts the event into the user's primary calendar.
    async fn insert_event(
        &self,
        access_token: &str,
        event: &CalendarEvent,
    ) -> Result<CreatedEvent, CalendarError>;
}

/// Creates calendar events from resolved plans. No retry, no idempotency key.
pub struct CalendarMaterializer {
    provider: Arc<dyn CalendarProvider>,
}

impl CalendarMaterializer {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        Self { provider }
    }

    pub async fn create(
        &self,
        refresh_token: &str,
        title: &str,
        description: &str,
        window: &ResolvedWindow,
        recurrence_rrule: Option<&str>,
    ) -> Result<CreatedEvent, CalendarError> {
        let access_token = self.provider.refresh_access_token(refresh_token).await?;
        let event = CalendarEvent::new(title, description, window, recurrence_rrule);
        let created = self.provider.insert_event(&access_token, &event).await?;
        tracing::info!(
            target: "present::calendar",
            event_id = %created.id,
            link = %created.html_link,
            recurring = event.recurrence.is_some(),
            "Event created"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn window() -> ResolvedWindow {
        ResolvedWindow {
            start_time: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 1, 1, 10, 30, 0).unwrap(),
        }
    }

    #[derive(Default)]
    struct RecordingProvider {
        refreshed_with: Mutex<Option<String>>,
        inserted: Mutex<Vec<(String, CalendarEvent)>>,
        reject_insert: Option<String>,
    }

    #[async_trait::async_trait]
    impl CalendarProvider for RecordingProvider {
        async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, CalendarError> {
            *self.refreshed_with.lock().unwrap() = Some(refresh_token.to_string());
            Ok("access-123".to_string())
        }

        async fn insert_event(
            &self,
            access_token: &str,
            event: &CalendarEvent,
        ) -> Result<CreatedEvent, CalendarError> {
            if let Some(reason) = &self.reject_insert {
                return Err(CalendarError::Provider(reason.clone()));
            }
            self.inserted
                .lock()
                .unwrap()
                .push((access_token.to_string(), event.clone()));
            Ok(CreatedEvent {
                id: "evt1".into(),
                summary: event.summary.clone(),
                html_link: "https://calendar.google.com/event?eid=evt1".into(),
            })
        }
    }

    #[test]
    fn recurrence_rule_becomes_single_prefixed_entry() {
        let event = CalendarEvent::new("t", "d", &window(), Some("FREQ=WEEKLY;COUNT=5"));
        assert_eq!(
            event.recurrence,
            Some(vec!["RRULE:FREQ=WEEKLY;COUNT=5".to_string()])
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["recurrence"], serde_json::json!(["RRULE:FREQ=WEEKLY;COUNT=5"]));
    }

    #[test]
    fn recurrence_is_omitted_without_rule() {
        let event = CalendarEvent::new("t", "d", &window(), None);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("recurrence").is_none());
        assert_eq!(json["start"]["dateTime"], "2025-01-01T10:00:00+00:00");
        assert_eq!(json["start"]["timeZone"], "UTC");
        assert_eq!(json["end"]["dateTime"], "2025-01-01T10:30:00+00:00");
    }

    #[tokio::test]
    async fn create_refreshes_then_inserts() {
        let provider = Arc::new(RecordingProvider::default());
        let materializer = CalendarMaterializer::new(provider.clone());
        let created = materializer
            .create("refresh-abc", "Run", "For the goal", &window(), None)
            .await
            .unwrap();
        assert_eq!(created.summary, "Run");
        assert!(!created.html_link.is_empty());
        assert_eq!(
            provider.refreshed_with.lock().unwrap().as_deref(),
            Some("refresh-abc")
        );
        let inserted = provider.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].0, "access-123");
        assert_eq!(inserted[0].1.summary, "Run");
    }

    #[tokio::test]
    async fn provider_rejection_carries_reason() {
        let provider = Arc::new(RecordingProvider {
            reject_insert: Some("Invalid recurrence rule.".into()),
            ..Default::default()
        });
        let materializer = CalendarMaterializer::new(provider);
        let err = materializer
            .create("r", "t", "d", &window(), Some("FREQ=NEVER"))
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::Provider(ref r) if r == "Invalid recurrence rule."));
    }
}
