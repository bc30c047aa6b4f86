//! Google OAuth2 and Calendar v3 over REST.
//!
//! [`GoogleOAuth`] drives the one-time consent flow that yields a refresh token.
//! [`GoogleCalendar`] turns that refresh token into an access token on every action
//! and inserts events into the user's primary calendar.

use present_core::{
    CalendarError, CalendarEvent, CalendarProvider, CoreConfig, CreatedEvent, GOOGLE_CALENDAR_SCOPE,
};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

/// Token endpoint response for both the authorization-code and refresh grants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthTokens {
    #[serde(default)]
    pub access_token: String,
    /// Only present on the first consent (or when `prompt=consent` forces a new one).
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// Pulls a human-readable reason out of a Google error body.
///
/// Calendar errors look like `{"error": {"message": ..., "errors": [{"reason": ...}]}}`,
/// token endpoint errors like `{"error": "invalid_grant", "error_description": ...}`.
pub fn google_error_reason(status: StatusCode, body: &str) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback();
    };
    match &json["error"] {
        serde_json::Value::Object(err) => err
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .or_else(|| {
                err.get("errors")
                    .and_then(|e| e.get(0))
                    .and_then(|e| e.get("reason"))
                    .and_then(|r| r.as_str())
            })
            .map(str::to_string)
            .unwrap_or_else(fallback),
        serde_json::Value::String(code) => json["error_description"]
            .as_str()
            .filter(|d| !d.is_empty())
            .unwrap_or(code)
            .to_string(),
        _ => fallback(),
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    what: &str,
) -> Result<T, CalendarError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| CalendarError::Transport(e.to_string()))?;
    if !status.is_success() {
        let reason = google_error_reason(status, &body);
        tracing::warn!(
            target: "present::skills",
            status = status.as_u16(),
            "{} failed: {}",
            what,
            reason
        );
        return Err(CalendarError::Provider(reason));
    }
    serde_json::from_str(&body)
        .map_err(|e| CalendarError::Transport(format!("Invalid {} response: {}", what, e)))
}

/// OAuth client credentials shared by the consent flow and the refresh grant.
#[derive(Debug, Clone)]
struct ClientCredentials {
    client_id: String,
    client_secret: String,
    token_uri: String,
}

impl ClientCredentials {
    fn from_config(config: &CoreConfig) -> Self {
        Self {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            token_uri: config.google_token_uri.clone(),
        }
    }
}

/// Calendar provider backed by the Google Calendar v3 REST API.
pub struct GoogleCalendar {
    client: reqwest::Client,
    credentials: ClientCredentials,
    api_base: String,
}

impl GoogleCalendar {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials: ClientCredentials::from_config(config),
            api_base: config.calendar_api_base.trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/primary/events", self.api_base)
    }
}

#[async_trait::async_trait]
impl CalendarProvider for GoogleCalendar {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, CalendarError> {
        let c = &self.credentials;
        let resp = self
            .client
            .post(&c.token_uri)
            .form(&[
                ("client_id", c.client_id.as_str()),
                ("client_secret", c.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;
        let tokens: OAuthTokens = read_json(resp, "Token refresh").await?;
        if tokens.access_token.is_empty() {
            return Err(CalendarError::Provider(
                "No access_token in token response".into(),
            ));
        }
        Ok(tokens.access_token)
    }

    async fn insert_event(
        &self,
        access_token: &str,
        event: &CalendarEvent,
    ) -> Result<CreatedEvent, CalendarError> {
        let resp = self
            .client
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;
        read_json(resp, "Event insert").await
    }
}

/// Consent flow: builds the authorization URL and exchanges the returned code.
pub struct GoogleOAuth {
    client: reqwest::Client,
    credentials: ClientCredentials,
    redirect_uri: String,
    auth_uri: String,
}

impl GoogleOAuth {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials: ClientCredentials::from_config(config),
            redirect_uri: config.google_redirect_uri.clone(),
            auth_uri: config.google_auth_uri.clone(),
        }
    }

    /// True when client id, secret and redirect URI are all set.
    pub fn is_configured(&self) -> bool {
        !self.credentials.client_id.is_empty()
            && !self.credentials.client_secret.is_empty()
            && !self.redirect_uri.is_empty()
    }

    /// Consent URL for offline access to calendar events. `state` is echoed back on callback.
    pub fn authorization_url(&self, state: &str) -> Result<String, CalendarError> {
        let url = Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", GOOGLE_CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("include_granted_scopes", "true"),
                ("state", state),
            ],
        )
        .map_err(|e| CalendarError::Transport(format!("Invalid google_auth_uri: {}", e)))?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokens, CalendarError> {
        let c = &self.credentials;
        let resp = self
            .client
            .post(&c.token_uri)
            .form(&[
                ("client_id", c.client_id.as_str()),
                ("client_secret", c.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;
        read_json(resp, "Code exchange").await
    }
}
