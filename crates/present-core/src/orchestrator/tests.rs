use super::*;
use crate::calendar::{CalendarEvent, CalendarProvider, CreatedEvent};
use crate::error::{GenerationError, StoreError};
use crate::plan::CompletionProvider;
use crate::shared::{ActionPayload, Personality, PlanMode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct MemoryStore {
    goals: HashMap<(String, String), Goal>,
    credentials: HashMap<String, String>,
    fail: bool,
}

impl GoalStore for MemoryStore {
    fn get_goal(&self, user_id: &str, goal_id: &str) -> Result<Option<Goal>, StoreError> {
        if self.fail {
            return Err(StoreError::Serde(
                serde_json::from_str::<Goal>("{").unwrap_err(),
            ));
        }
        Ok(self
            .goals
            .get(&(user_id.to_string(), goal_id.to_string()))
            .cloned())
    }
}

impl CredentialStore for MemoryStore {
    fn get_calendar_credential(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.credentials.get(user_id).cloned())
    }
}

struct CannedCompletion {
    raw: String,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl CompletionProvider for CannedCompletion {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete_json(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.raw.clone())
    }
}

#[derive(Default)]
struct FakeCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    reject: Option<String>,
}

#[async_trait::async_trait]
impl CalendarProvider for FakeCalendar {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, CalendarError> {
        assert_eq!(refresh_token, "1//refresh");
        Ok("access".into())
    }

    async fn insert_event(
        &self,
        _access_token: &str,
        event: &CalendarEvent,
    ) -> Result<CreatedEvent, CalendarError> {
        if let Some(reason) = &self.reject {
            return Err(CalendarError::Provider(reason.clone()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(CreatedEvent {
            id: "evt".into(),
            summary: event.summary.clone(),
            html_link: "https://calendar.google.com/event?eid=evt".into(),
        })
    }
}

struct Harness {
    orchestrator: ActionOrchestrator,
    completion: Arc<CannedCompletion>,
    calendar: Arc<FakeCalendar>,
}

const PLAN: &str = r#"{
    "title": "Morning run",
    "description": "A step toward the marathon goal",
    "duration_minutes": "30",
    "start_time_iso": "2030-05-01T07:00:00Z",
    "recurrence_rrule": "FREQ=WEEKLY;COUNT=5"
}"#;

fn harness(store: MemoryStore, plan: &str, calendar: FakeCalendar) -> Harness {
    let key = TokenCipher::generate_hex_key();
    let cipher = Arc::new(TokenCipher::from_hex_key(&key).unwrap());
    let mut store = store;
    for blob in store.credentials.values_mut() {
        if blob == "ENCRYPT_ME" {
            *blob = cipher.encrypt("1//refresh").unwrap();
        }
    }
    let store = Arc::new(store);
    let completion = Arc::new(CannedCompletion {
        raw: plan.to_string(),
        calls: AtomicUsize::new(0),
    });
    let calendar = Arc::new(calendar);
    let orchestrator = ActionOrchestrator::new(
        store.clone(),
        store,
        cipher,
        PlanGenerator::new(completion.clone(), PlanMode::TimeAware),
        CalendarMaterializer::new(calendar.clone()),
    );
    Harness {
        orchestrator,
        completion,
        calendar,
    }
}

fn store_with(goal: bool, credential: Option<&str>) -> MemoryStore {
    let mut store = MemoryStore::default();
    if goal {
        store.goals.insert(
            ("alice".into(), "g1".into()),
            Goal {
                id: "g1".into(),
                name: "Marathon".into(),
                avatar: None,
                description: None,
            },
        );
    }
    if let Some(c) = credential {
        store.credentials.insert("alice".into(), c.into());
    }
    store
}

fn request(task_type: &str) -> ActionRequest {
    ActionRequest {
        task_type: TaskType::from(task_type.to_string()),
        payload: ActionPayload {
            goal_id: "g1".into(),
            task_prompt: "go running every week".into(),
            personality: Personality::Producer,
        },
    }
}

#[tokio::test]
async fn schedules_event_with_recurrence() {
    let h = harness(store_with(true, Some("ENCRYPT_ME")), PLAN, FakeCalendar::default());
    let out = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap();
    assert_eq!(out.message, "Task scheduled successfully");
    assert_eq!(out.event_title, "Morning run");
    assert!(!out.event_link.is_empty());
    assert!(out.recurrence_applied);

    let events = h.calendar.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].start.date_time, "2030-05-01T07:00:00+00:00");
    assert_eq!(events[0].end.date_time, "2030-05-01T07:30:00+00:00");
    assert_eq!(
        events[0].recurrence,
        Some(vec!["RRULE:FREQ=WEEKLY;COUNT=5".to_string()])
    );
}

#[tokio::test]
async fn missing_goal_is_not_found_and_skips_generation() {
    let h = harness(store_with(false, Some("ENCRYPT_ME")), PLAN, FakeCalendar::default());
    let err = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::GoalNotFound));
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn goal_store_failure_is_internal() {
    let mut store = store_with(true, None);
    store.fail = true;
    let h = harness(store, PLAN, FakeCalendar::default());
    let err = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Internal(ref m) if m.starts_with("Error fetching goal")));
}

#[tokio::test]
async fn unknown_task_type_is_unhandled_without_calendar_call() {
    let h = harness(store_with(true, Some("ENCRYPT_ME")), PLAN, FakeCalendar::default());
    let err = h
        .orchestrator
        .execute("alice", &request("unknown_type"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unhandled));
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    assert!(h.calendar.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credential_is_unauthorized_after_generation() {
    let h = harness(store_with(true, None), PLAN, FakeCalendar::default());
    let err = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ActionError::Unauthorized(ref m) if m == "User has not authorized Google Calendar.")
    );
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    assert!(h.calendar.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn undecryptable_credential_is_unauthorized() {
    let h = harness(store_with(true, Some("c0ffee")), PLAN, FakeCalendar::default());
    let err = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Unauthorized(ref m) if m == "Could not decrypt calendar token."));
}

#[tokio::test]
async fn malformed_plan_is_generation_error() {
    let h = harness(
        store_with(true, Some("ENCRYPT_ME")),
        r#"["not", "an", "object"]"#,
        FakeCalendar::default(),
    );
    let err = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Generation(GenerationError::NotAnObject)));
}

#[tokio::test]
async fn provider_rejection_maps_to_provider_error() {
    let h = harness(
        store_with(true, Some("ENCRYPT_ME")),
        PLAN,
        FakeCalendar {
            reject: Some("Invalid recurrence rule.".into()),
            ..Default::default()
        },
    );
    let err = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Provider(ref r) if r == "Invalid recurrence rule."));
}

#[tokio::test]
async fn garbled_start_time_still_schedules() {
    let plan = r#"{"title":"Call mom","description":"d","duration_minutes":15,"start_time_iso":"soonish"}"#;
    let h = harness(store_with(true, Some("ENCRYPT_ME")), plan, FakeCalendar::default());
    let out = h
        .orchestrator
        .execute("alice", &request("schedule_task"))
        .await
        .unwrap();
    assert!(!out.recurrence_applied);
    assert_eq!(h.calendar.events.lock().unwrap()[0].recurrence, None);
}
