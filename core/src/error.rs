use thiserror::Error;

/// Failures talking to the habit API, or rejected before the call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Cannot connect to server: {0}")]
    NetworkUnavailable(String),

    #[error("Server returned non-JSON response (likely an error page)")]
    NonJsonResponse { content_type: Option<String> },

    #[error("HTTP {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Server returned invalid JSON: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    /// The message shown to the user. Transport details stay in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnavailable(_) => "Cannot connect to server".to_string(),
            other => other.to_string(),
        }
    }
}
