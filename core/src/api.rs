use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::models::{AuthResponse, Credentials, Habit, HabitId, HabitLogEntry, ToggleRequest};

/// Which listing endpoint supplies the habit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HabitListing {
    /// `GET /habits/`
    #[default]
    Plain,
    /// `GET /habits/with-stats/`, which also carries streaks.
    WithStats,
}

impl HabitListing {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Plain => "/habits/",
            Self::WithStats => "/habits/with-stats/",
        }
    }
}

/// How a completion change is sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToggleEndpoint {
    /// `POST /habits/{id}/toggle`; the server flips its own state.
    #[default]
    Toggle,
    /// `POST /habits/{id}/complete` to complete, `DELETE` to un-complete.
    Complete,
}

/// The remote habit service.
///
/// The CLI implements this with reqwest; tests use scripted in-memory fakes.
#[async_trait]
pub trait HabitApi: Send + Sync {
    async fn list_habits(&self, listing: HabitListing) -> Result<Vec<Habit>, ApiError>;
    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<HabitLogEntry>, ApiError>;
    async fn toggle(&self, habit_id: &HabitId, request: &ToggleRequest) -> Result<(), ApiError>;
    async fn complete(&self, habit_id: &HabitId, request: &ToggleRequest)
    -> Result<(), ApiError>;
    async fn uncomplete(&self, habit_id: &HabitId, date: NaiveDate) -> Result<(), ApiError>;
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;
}

#[must_use]
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';')
            .next()
            .map(str::trim)
            .is_some_and(|mime| mime.eq_ignore_ascii_case("application/json"))
    })
}

/// Turn a raw HTTP response into a typed body.
///
/// Non-2xx is an [`ApiError::HttpError`], with the message taken from a JSON
/// `detail` or `message` field when the server sent one. A 2xx response that
/// is not JSON is rejected as well, since proxies and dev servers answer
/// unknown routes with HTML and status 200.
pub fn decode_response<T: DeserializeOwned>(
    status: u16,
    reason: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<T, ApiError> {
    let is_json = is_json_content_type(content_type);

    if !(200..300).contains(&status) {
        let message = if is_json {
            error_detail(body)
        } else {
            None
        };
        return Err(ApiError::HttpError {
            status,
            message: message.unwrap_or_else(|| reason.to_string()),
        });
    }

    if !is_json {
        return Err(ApiError::NonJsonResponse {
            content_type: content_type.map(str::to_string),
        });
    }

    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let field = value.get("detail").or_else(|| value.get("message"))?;
    match field {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
