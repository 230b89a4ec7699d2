//! Typed HTTP client for the nutriplan API.
//!
//! The session is a plain value owned by [`ApiClient`]. A 401 from any call
//! drops it, so callers see [`ClientError::SessionExpired`] and log in again.
//! Session changes happen only after a response has been read; dropping a
//! request future mid-flight leaves the client untouched.

use reqwest::{IntoUrl, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::auth::services::{AccessMode, UserRole};
use crate::dates::format_iso_date;
use crate::nutrition::services::{MacroTargets, ProfileInput};
use crate::planning::services::{normalize_client_ref, normalize_slot_key, DayKey};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally, no request was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("session expired")]
    SessionExpired,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Credentials of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub access_mode: AccessMode,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginView {
    pub access_token: String,
    pub token_type: String,
    pub access_mode: AccessMode,
    pub user: UserView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeView {
    #[serde(flatten)]
    pub user: UserView,
    pub access_mode: AccessMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetsView {
    pub daily: MacroTargets,
    pub weekly: MacroTargets,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanSlotView {
    pub id: Uuid,
    pub day_key: String,
    pub slot_key: String,
    pub dish_template_id: Option<Uuid>,
    pub dish_name: Option<String>,
    pub notes: Option<String>,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeekPlanView {
    pub id: Uuid,
    pub template_id: Option<Uuid>,
    pub client_ref: String,
    pub week_start_date: String,
    pub template_name_snapshot: Option<String>,
    pub items: Vec<PlanSlotView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionView {
    pub id: Uuid,
    pub name: String,
    pub meal_type: Option<String>,
    pub score: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerClientView {
    pub id: Uuid,
    pub full_name: String,
    pub plan_status: String,
    pub last_check_in_label: String,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Option<Session>,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:8080/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Resume a session persisted by the caller.
    pub fn restore(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn logout(&mut self) {
        self.session = None;
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginView, ClientError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "email and password are required".into(),
            ));
        }

        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&Credentials { email: &email, password });
        let response = request.send().await?;
        let login: LoginView = parse_response(response).await?;

        self.session = Some(Session {
            token: login.access_token.clone(),
            access_mode: login.access_mode,
            email: login.user.email.clone(),
        });
        Ok(login)
    }

    pub async fn me(&mut self) -> Result<MeView, ClientError> {
        self.send(Method::GET, "/auth/me", |r| r).await
    }

    pub async fn my_targets(&mut self) -> Result<TargetsView, ClientError> {
        self.send(Method::GET, "/nutrition/targets/me", |r| r).await
    }

    pub async fn preview_targets(
        &mut self,
        profile: &ProfileInput,
    ) -> Result<TargetsView, ClientError> {
        self.send(Method::POST, "/nutrition/targets/preview", |r| r.json(profile))
            .await
    }

    pub async fn week_plan(
        &mut self,
        client_ref: &str,
        week_start_date: Date,
    ) -> Result<WeekPlanView, ClientError> {
        let client_ref = normalize_client_ref(client_ref)
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let week = format_iso_date(week_start_date);
        self.send(Method::GET, "/planning/week-plan-instances/by-client-week", |r| {
            r.query(&[("client_ref", client_ref.as_str()), ("week_start_date", week.as_str())])
        })
        .await
    }

    pub async fn create_week_plan(
        &mut self,
        template_id: Uuid,
        client_ref: &str,
        week_start_date: Date,
    ) -> Result<WeekPlanView, ClientError> {
        let client_ref = normalize_client_ref(client_ref)
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let body = serde_json::json!({
            "template_id": template_id,
            "client_ref": client_ref,
            "week_start_date": format_iso_date(week_start_date),
        });
        self.send(Method::POST, "/planning/week-plan-instances/from-template", |r| {
            r.json(&body)
        })
        .await
    }

    /// Points one slot of a plan at another dish.
    pub async fn substitute_slot(
        &mut self,
        instance_id: Uuid,
        day: DayKey,
        slot_key: &str,
        dish_template_id: Uuid,
    ) -> Result<WeekPlanView, ClientError> {
        let slot_key =
            normalize_slot_key(slot_key).map_err(|e| ClientError::Validation(e.to_string()))?;
        let url = self.slot_url(instance_id, day, &slot_key)?;
        let body = serde_json::json!({ "dish_template_id": dish_template_id });
        self.send_to(Method::PUT, url, |r| r.json(&body)).await
    }

    pub async fn dish_suggestions(
        &mut self,
        slot_key: &str,
        query: Option<&str>,
    ) -> Result<Vec<SuggestionView>, ClientError> {
        let slot_key =
            normalize_slot_key(slot_key).map_err(|e| ClientError::Validation(e.to_string()))?;
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        self.send(Method::GET, "/planning/dish-suggestions", |r| {
            let r = r.query(&[("slot_key", slot_key.as_str())]);
            match query {
                Some(q) => r.query(&[("query", q)]),
                None => r,
            }
        })
        .await
    }

    pub async fn worker_clients(
        &mut self,
        query: Option<&str>,
    ) -> Result<Vec<WorkerClientView>, ClientError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        self.send(Method::GET, "/worker/clients", |r| match query {
            Some(q) => r.query(&[("query", q)]),
            None => r,
        })
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Slot keys are free text, so the last segment goes through `Url`'s
    /// segment encoder rather than string formatting.
    fn slot_url(&self, instance_id: Uuid, day: DayKey, slot_key: &str) -> Result<Url, ClientError> {
        let base = self.url(&format!("/planning/week-plan-instances/{instance_id}/slots/{day}"));
        let mut url =
            Url::parse(&base).map_err(|e| ClientError::Validation(format!("base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Validation("base url cannot carry a path".to_string()))?
            .push(slot_key);
        Ok(url)
    }

    /// Authenticated request. A 401 clears the stored session.
    async fn send<T, F>(&mut self, method: Method, path: &str, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.url(path);
        self.send_to(method, url, build).await
    }

    async fn send_to<T, U, F>(&mut self, method: Method, url: U, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        U: IntoUrl,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let token = match &self.session {
            Some(s) => s.token.clone(),
            None => return Err(ClientError::SessionExpired),
        };

        let request = build(self.http.request(method, url).bearer_auth(token));
        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(url = %response.url(), "session rejected by server");
            self.session = None;
            return Err(ClientError::SessionExpired);
        }
        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Http {
            status: status.as_u16(),
            detail: error_detail(status.as_u16(), &body),
        });
    }
    Ok(response.json::<T>().await?)
}

/// The server's `detail` code when the body carries one, otherwise `HTTP <status>`.
pub fn error_detail(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail")?.as_str().map(str::to_string))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_comes_from_json_body() {
        assert_eq!(
            error_detail(409, r#"{"detail":"week_plan_instance_exists","code":"CONFLICT"}"#),
            "week_plan_instance_exists"
        );
    }

    #[test]
    fn detail_falls_back_to_status() {
        assert_eq!(error_detail(502, "<html>bad gateway</html>"), "HTTP 502");
        assert_eq!(error_detail(500, r#"{"detail":""}"#), "HTTP 500");
        assert_eq!(error_detail(404, r#"{"detail":42}"#), "HTTP 404");
    }

    #[test]
    fn slot_key_is_encoded_as_one_segment() {
        let client = ApiClient::new("http://localhost:8080/api/");
        let id = Uuid::new_v4();
        let prefix = format!("/api/planning/week-plan-instances/{id}/slots/{}/", DayKey::Mon);

        let url = client.slot_url(id, DayKey::Mon, "lunch").unwrap();
        assert_eq!(url.path(), format!("{prefix}lunch"));

        let url = client.slot_url(id, DayKey::Mon, "post workout").unwrap();
        assert_eq!(url.path(), format!("{prefix}post%20workout"));

        let url = client.slot_url(id, DayKey::Mon, "a/b?c#d").unwrap();
        assert_eq!(url.path(), format!("{prefix}a%2Fb%3Fc%23d"));
        assert_eq!(url.query(), None);
    }

    #[test]
    fn slot_url_rejects_unusable_base() {
        let client = ApiClient::new("not a url");
        let err = client.slot_url(Uuid::new_v4(), DayKey::Tue, "lunch").unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn login_validates_before_sending() {
        let mut client = ApiClient::new("http://127.0.0.1:9");
        let err = client.login("  ", "secret123").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(client.session().is_none());
    }

    #[tokio::test]
    async fn calls_without_session_report_expiry() {
        let mut client = ApiClient::new("http://127.0.0.1:9");
        assert!(matches!(client.me().await, Err(ClientError::SessionExpired)));
    }

    #[tokio::test]
    async fn bad_client_ref_is_rejected_locally() {
        let mut client = ApiClient::new("http://127.0.0.1:9");
        client.restore(Session {
            token: "t".into(),
            access_mode: AccessMode::Active,
            email: "w@example.com".into(),
        });
        let week = time::macros::date!(2024 - 06 - 10);
        let err = client.week_plan("   ", week).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(client.session().is_some());
    }

    #[test]
    fn logout_clears_session() {
        let mut client = ApiClient::new("http://localhost:8080/api/");
        client.restore(Session {
            token: "t".into(),
            access_mode: AccessMode::ReadOnly,
            email: "w@example.com".into(),
        });
        assert_eq!(client.url("/auth/me"), "http://localhost:8080/api/auth/me");
        client.logout();
        assert!(client.session().is_none());
    }
}
