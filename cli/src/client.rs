use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

use ritualist_core::api::{HabitApi, HabitListing, decode_response};
use ritualist_core::error::ApiError;
use ritualist_core::models::{
    AuthResponse, Credentials, Habit, HabitId, HabitLogEntry, ToggleRequest,
};

/// reqwest-backed client for the habit API.
pub struct HttpHabitApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpHabitApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid API URL: '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid API URL: '{base_url}'");
        }
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "ritualist-cli/{} (habit tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Join path segments onto the base URL. An empty last segment keeps the
    /// trailing slash the API routes expect.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::NetworkUnavailable(e.to_string()))?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(url = %resp.url(), %status, content_type = ?content_type, "API response");
        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::NetworkUnavailable(e.to_string()))?;
        decode_response(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            content_type.as_deref(),
            &body,
        )
    }
}

#[async_trait]
impl HabitApi for HttpHabitApi {
    async fn list_habits(&self, listing: HabitListing) -> Result<Vec<Habit>, ApiError> {
        let segments: &[&str] = match listing {
            HabitListing::Plain => &["habits", ""],
            HabitListing::WithStats => &["habits", "with-stats", ""],
        };
        self.send(self.request(Method::GET, self.url(segments)))
            .await
    }

    async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<HabitLogEntry>, ApiError> {
        let mut url = self.url(&["habits", "logs", ""]);
        url.query_pairs_mut()
            .append_pair("date", &date.format("%Y-%m-%d").to_string());
        self.send(self.request(Method::GET, url)).await
    }

    async fn toggle(&self, habit_id: &HabitId, request: &ToggleRequest) -> Result<(), ApiError> {
        let url = self.url(&["habits", habit_id.as_str(), "toggle"]);
        let _: IgnoredAny = self
            .send(self.request(Method::POST, url).json(request))
            .await?;
        Ok(())
    }

    async fn complete(
        &self,
        habit_id: &HabitId,
        request: &ToggleRequest,
    ) -> Result<(), ApiError> {
        let url = self.url(&["habits", habit_id.as_str(), "complete"]);
        let _: IgnoredAny = self
            .send(self.request(Method::POST, url).json(request))
            .await?;
        Ok(())
    }

    async fn uncomplete(&self, habit_id: &HabitId, date: NaiveDate) -> Result<(), ApiError> {
        let url = self.url(&["habits", habit_id.as_str(), "complete"]);
        let body = ToggleRequest { date, notes: None };
        let _: IgnoredAny = self
            .send(self.request(Method::DELETE, url).json(&body))
            .await?;
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let url = self.url(&["auth", "login"]);
        self.send(self.request(Method::POST, url).json(credentials))
            .await
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let url = self.url(&["auth", "register"]);
        self.send(self.request(Method::POST, url).json(credentials))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::{Html, IntoResponse},
        routing::{get, post},
    };
    use ritualist_core::models::SnapshotSource;
    use ritualist_core::reconciler::{HabitReconciler, ReconcilerOptions};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorded {
        toggles: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    async fn list_habits() -> Json<Value> {
        Json(json!([
            {"id": 1, "title": "Stretch", "category": "Health", "periodicity": "daily"},
            {"id": 2, "title": "Journal", "category": null, "frequency": 2, "periodicity": "weekly"}
        ]))
    }

    async fn logs(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        let date = q.get("date").cloned().unwrap_or_default();
        Json(json!([{"habit_id": 1, "date": date, "completed": true}]))
    }

    async fn toggle(
        State(rec): State<Recorded>,
        Path(id): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        rec.toggles.lock().unwrap().push((id, auth, body));
        Json(json!({"message": "ok", "success": true}))
    }

    async fn login() -> impl IntoResponse {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        )
    }

    async fn html_page() -> Html<&'static str> {
        Html("<!doctype html><html><body>index</body></html>")
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn api_server(rec: Recorded) -> String {
        let router = Router::new()
            .route("/habits/", get(list_habits))
            .route("/habits/logs/", get(logs))
            .route("/habits/{id}/toggle", post(toggle))
            .route("/auth/login", post(login))
            .with_state(rec);
        serve(router).await
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    #[tokio::test]
    async fn fetches_habits_and_logs() {
        let base = api_server(Recorded::default()).await;
        let api = HttpHabitApi::new(&base, None).unwrap();

        let habits = api.list_habits(HabitListing::Plain).await.unwrap();
        let logs = api.logs_for_date(day()).await.unwrap();

        assert_eq!(habits.len(), 2);
        assert_eq!(habits[0].name, "Stretch");
        assert_eq!(habits[1].target_frequency.get(), 2);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].date, day());
    }

    #[tokio::test]
    async fn toggle_sends_date_and_token() {
        let rec = Recorded::default();
        let base = api_server(rec.clone()).await;
        let api = HttpHabitApi::new(&base, Some("tok-123".into())).unwrap();

        api.toggle(
            &HabitId::new("2"),
            &ToggleRequest {
                date: day(),
                notes: None,
            },
        )
        .await
        .unwrap();

        let toggles = rec.toggles.lock().unwrap();
        assert_eq!(toggles.len(), 1);
        let (id, auth, body) = &toggles[0];
        assert_eq!(id, "2");
        assert_eq!(auth.as_deref(), Some("Bearer tok-123"));
        assert_eq!(body, &json!({"date": "2024-05-20"}));
    }

    #[tokio::test]
    async fn login_rejection_carries_detail() {
        let base = api_server(Recorded::default()).await;
        let api = HttpHabitApi::new(&base, None).unwrap();

        let err = api
            .login(&Credentials {
                email: "a@b.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ApiError::HttpError {
                status: 401,
                message: "Incorrect email or password".into()
            }
        );
    }

    #[tokio::test]
    async fn html_page_with_200_is_rejected() {
        let base = serve(Router::new().fallback(html_page)).await;
        let api = HttpHabitApi::new(&base, None).unwrap();

        let err = api.list_habits(HabitListing::Plain).await.unwrap_err();

        assert!(matches!(err, ApiError::NonJsonResponse { .. }));
    }

    #[tokio::test]
    async fn reconciler_shows_demo_data_behind_html_server() {
        let base = serve(Router::new().fallback(html_page)).await;
        let api = HttpHabitApi::new(&base, None).unwrap();
        let rec = HabitReconciler::new(api, ReconcilerOptions::default(), day());

        let snapshot = rec.refresh().await;

        assert_eq!(snapshot.source, SnapshotSource::Fallback);
        assert!(snapshot.error.is_some());
        assert_eq!(snapshot.habits.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let api = HttpHabitApi::new(&format!("http://{addr}"), None).unwrap();

        let err = api.logs_for_date(day()).await.unwrap_err();

        assert!(matches!(err, ApiError::NetworkUnavailable(_)));
    }

    #[test]
    fn test_url_keeps_base_path() {
        let api = HttpHabitApi::new("http://example.com/api/", None).unwrap();
        assert_eq!(
            api.url(&["habits", ""]).as_str(),
            "http://example.com/api/habits/"
        );
        let api = HttpHabitApi::new("http://example.com", None).unwrap();
        assert_eq!(
            api.url(&["habits", "a b", "toggle"]).as_str(),
            "http://example.com/habits/a%20b/toggle"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(HttpHabitApi::new("not a url", None).is_err());
        assert!(HttpHabitApi::new("mailto:someone@example.com", None).is_err());
    }
}
