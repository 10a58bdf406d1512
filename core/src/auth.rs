use anyhow::Result;
use tracing::{info, warn};

use crate::api::HabitApi;
use crate::error::ApiError;
use crate::models::{AuthResponse, Credentials};
use crate::session::{SessionContext, SessionStore};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    SignedIn(SessionContext),
    /// The auth service could not be used; a demo session was stored instead.
    Demo {
        session: SessionContext,
        notice: String,
    },
}

/// How a failed auth call is reported back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    Unauthorized,
    ServiceUnavailable,
    Other(String),
}

impl LoginFailure {
    #[must_use]
    pub fn classify(err: &ApiError) -> Self {
        match err {
            ApiError::NetworkUnavailable(_) => Self::ServiceUnavailable,
            ApiError::HttpError { status: 401, .. } => Self::Unauthorized,
            ApiError::HttpError { message, .. } if message.contains("Unauthorized") => {
                Self::Unauthorized
            }
            ApiError::HttpError { status: 404, .. } => Self::ServiceUnavailable,
            ApiError::HttpError { message, .. } if message.contains("not found") => {
                Self::ServiceUnavailable
            }
            other => Self::Other(other.user_message()),
        }
    }
}

/// Local checks run before anything is sent.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ApiError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Please fill in all fields".into()));
    }
    let well_formed = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && !domain.is_empty() && !domain.contains('@')
    });
    if !well_formed {
        return Err(ApiError::Validation(
            "Please enter a valid email address".into(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// Sign in or register, persisting the resulting session.
///
/// Returns `Err` with a user-facing message for rejected credentials and
/// generic failures. When the auth service is missing or unreachable the user
/// is let in with a demo session.
pub async fn authenticate(
    api: &dyn HabitApi,
    store: &mut dyn SessionStore,
    mode: AuthMode,
    email: &str,
    password: &str,
) -> Result<LoginOutcome> {
    validate_credentials(email, password)?;

    let credentials = Credentials {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let result = match mode {
        AuthMode::Login => api.login(&credentials).await,
        AuthMode::Register => api.register(&credentials).await,
    };

    match result {
        Ok(response) => {
            let session = session_from_response(&credentials.email, response);
            SessionContext::clear(store)?;
            session.persist(store)?;
            info!(email = %credentials.email, "signed in");
            Ok(LoginOutcome::SignedIn(session))
        }
        Err(err) => match LoginFailure::classify(&err) {
            LoginFailure::Unauthorized => anyhow::bail!("Invalid email or password"),
            LoginFailure::ServiceUnavailable => {
                warn!(error = %err, "auth service unavailable, using demo mode");
                let notice = match err {
                    ApiError::NetworkUnavailable(_) => "Cannot connect to server. Using demo mode.",
                    _ => "Authentication service unavailable. Using demo mode.",
                };
                let session = demo_session(&credentials.email);
                SessionContext::clear(store)?;
                session.persist(store)?;
                Ok(LoginOutcome::Demo {
                    session,
                    notice: notice.to_string(),
                })
            }
            LoginFailure::Other(message) => anyhow::bail!(message),
        },
    }
}

fn local_part(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

fn session_from_response(email: &str, response: AuthResponse) -> SessionContext {
    let user = response.user.unwrap_or_default();
    SessionContext {
        logged_in: true,
        demo: false,
        email: Some(email.to_string()),
        name: Some(
            user.name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| local_part(email)),
        ),
        user_id: user.id.map(|id| id.to_string()),
        access_token: response.access_token,
        refresh_token: response.refresh_token,
    }
}

fn demo_session(email: &str) -> SessionContext {
    SessionContext {
        logged_in: true,
        demo: true,
        email: Some(email.to_string()),
        name: Some(local_part(email)),
        ..SessionContext::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HabitListing;
    use crate::models::{AuthUser, Habit, HabitId, HabitLogEntry, ToggleRequest};
    use crate::session::{KEY_ACCESS_TOKEN, KEY_DEMO, KEY_LOGGED_IN, MemoryStore};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AuthFake {
        reply: Mutex<Option<Result<AuthResponse, ApiError>>>,
        calls: AtomicUsize,
    }

    impl AuthFake {
        fn replying(reply: Result<AuthResponse, ApiError>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
            }
        }

        fn answer(&self) -> Result<AuthResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.lock().unwrap().take().expect("unexpected call")
        }
    }

    #[async_trait]
    impl HabitApi for AuthFake {
        async fn list_habits(&self, _l: HabitListing) -> Result<Vec<Habit>, ApiError> {
            unimplemented!()
        }
        async fn logs_for_date(&self, _d: NaiveDate) -> Result<Vec<HabitLogEntry>, ApiError> {
            unimplemented!()
        }
        async fn toggle(&self, _i: &HabitId, _r: &ToggleRequest) -> Result<(), ApiError> {
            unimplemented!()
        }
        async fn complete(&self, _i: &HabitId, _r: &ToggleRequest) -> Result<(), ApiError> {
            unimplemented!()
        }
        async fn uncomplete(&self, _i: &HabitId, _d: NaiveDate) -> Result<(), ApiError> {
            unimplemented!()
        }
        async fn login(&self, _c: &Credentials) -> Result<AuthResponse, ApiError> {
            self.answer()
        }
        async fn register(&self, _c: &Credentials) -> Result<AuthResponse, ApiError> {
            self.answer()
        }
    }

    fn ok_response() -> AuthResponse {
        AuthResponse {
            access_token: Some("access".into()),
            refresh_token: None,
            user: Some(AuthUser {
                id: Some(HabitId::new("5")),
                name: Some("Demo User".into()),
            }),
        }
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_credentials("a@b.com", "secret").is_ok());
        assert_eq!(
            validate_credentials("", "secret").unwrap_err(),
            ApiError::Validation("Please fill in all fields".into())
        );
        assert_eq!(
            validate_credentials("nobody", "secret").unwrap_err(),
            ApiError::Validation("Please enter a valid email address".into())
        );
        assert!(validate_credentials("@b.com", "secret").is_err());
        assert!(validate_credentials("a@", "secret").is_err());
        assert!(validate_credentials("a@b@c", "secret").is_err());
        assert_eq!(
            validate_credentials("a@b.com", "12345").unwrap_err(),
            ApiError::Validation("Password must be at least 6 characters long".into())
        );
    }

    #[test]
    fn test_classify() {
        let http = |status, message: &str| ApiError::HttpError {
            status,
            message: message.into(),
        };
        assert_eq!(
            LoginFailure::classify(&http(401, "Incorrect password")),
            LoginFailure::Unauthorized
        );
        assert_eq!(
            LoginFailure::classify(&http(403, "Unauthorized")),
            LoginFailure::Unauthorized
        );
        assert_eq!(
            LoginFailure::classify(&http(404, "Not Found")),
            LoginFailure::ServiceUnavailable
        );
        assert_eq!(
            LoginFailure::classify(&http(404, "Unauthorized")),
            LoginFailure::Unauthorized
        );
        assert_eq!(
            LoginFailure::classify(&ApiError::NetworkUnavailable("refused".into())),
            LoginFailure::ServiceUnavailable
        );
        assert_eq!(
            LoginFailure::classify(&http(500, "boom")),
            LoginFailure::Other("HTTP 500: boom".into())
        );
    }

    #[tokio::test]
    async fn short_password_never_reaches_server() {
        let api = AuthFake::replying(Ok(ok_response()));
        let mut store = MemoryStore::new();

        let err = authenticate(&api, &mut store, AuthMode::Login, "a@b.com", "12345")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Password must be at least 6 characters long");
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn successful_login_persists_session() {
        let api = AuthFake::replying(Ok(ok_response()));
        let mut store = MemoryStore::new();

        let outcome = authenticate(&api, &mut store, AuthMode::Login, "demo@example.com", "demo123")
            .await
            .unwrap();

        let LoginOutcome::SignedIn(session) = outcome else {
            panic!("expected a real session");
        };
        assert_eq!(session.name.as_deref(), Some("Demo User"));
        assert_eq!(session.user_id.as_deref(), Some("5"));
        assert_eq!(store.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("access"));
        assert_eq!(SessionContext::load(&store).unwrap(), session);
    }

    #[tokio::test]
    async fn unauthorized_login_stores_nothing() {
        let api = AuthFake::replying(Err(ApiError::HttpError {
            status: 401,
            message: "Unauthorized".into(),
        }));
        let mut store = MemoryStore::new();

        let err = authenticate(&api, &mut store, AuthMode::Login, "a@b.com", "secret1")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_auth_service_falls_back_to_demo() {
        let api = AuthFake::replying(Err(ApiError::HttpError {
            status: 404,
            message: "Not Found".into(),
        }));
        let mut store = MemoryStore::new();

        let outcome =
            authenticate(&api, &mut store, AuthMode::Register, "sam@example.com", "secret1")
                .await
                .unwrap();

        let LoginOutcome::Demo { session, notice } = outcome else {
            panic!("expected demo mode");
        };
        assert_eq!(notice, "Authentication service unavailable. Using demo mode.");
        assert_eq!(session.name.as_deref(), Some("sam"));
        assert_eq!(store.get(KEY_LOGGED_IN).unwrap().as_deref(), Some("true"));
        assert_eq!(store.get(KEY_DEMO).unwrap().as_deref(), Some("true"));
        assert_eq!(store.get(KEY_ACCESS_TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_demo() {
        let api = AuthFake::replying(Err(ApiError::NetworkUnavailable("refused".into())));
        let mut store = MemoryStore::new();

        let outcome = authenticate(&api, &mut store, AuthMode::Login, "sam@example.com", "secret1")
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            LoginOutcome::Demo { ref notice, .. } if notice == "Cannot connect to server. Using demo mode."
        ));
    }

    #[tokio::test]
    async fn other_failures_keep_server_message() {
        let api = AuthFake::replying(Err(ApiError::NonJsonResponse { content_type: None }));
        let mut store = MemoryStore::new();

        let err = authenticate(&api, &mut store, AuthMode::Login, "a@b.com", "secret1")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Server returned non-JSON response (likely an error page)"
        );
        assert!(store.is_empty());
    }
}
