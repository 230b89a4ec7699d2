use std::borrow::Cow;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::json;

/// One rejected input field, e.g. `{"field": "height_cm", "code": "must_be_positive"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Cow<'static, str>,
    pub code: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, code: &'static str) -> Self {
        Self { field: Cow::Borrowed(field), code }
    }
}

/// Result of a parse-and-validate boundary: every offending field, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("invalid fields: {}", self.summary())]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, code: &'static str) {
        self.0.push(FieldError::new(field, code));
    }

    /// For field paths only known at runtime, e.g. from a serde error.
    pub fn push_owned(&mut self, field: String, code: &'static str) {
        self.0.push(FieldError { field: Cow::Owned(field), code });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(value)` when nothing was pushed, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    fn summary(&self) -> String {
        self.0
            .iter()
            .map(|e| format!("{}={}", e.field, e.code))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Error type returned by every HTTP handler.
///
/// `detail` strings are stable snake_case codes; clients key their messages off them.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => {
                let text = e.body_text();
                let message = text
                    .split_once("target type: ")
                    .map_or(text.as_str(), |(_, rest)| rest);
                let (field, code) = rejected_field(message, "body");
                tracing::warn!(%field, code, "json body rejected");
                let mut errors = FieldErrors::new();
                errors.push_owned(field, code);
                AppError::Validation(errors)
            }
            JsonRejection::JsonSyntaxError(_) => AppError::bad_request("malformed_json"),
            JsonRejection::MissingJsonContentType(_) => {
                AppError::bad_request("expected_json_content_type")
            }
            other => {
                tracing::warn!(error = %other.body_text(), "request body rejected");
                AppError::bad_request("invalid_body")
            }
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(e) => {
                tracing::warn!(error = %e.body_text(), "path parameter rejected");
                AppError::bad_request("invalid_path_param")
            }
            other => AppError::Internal(anyhow::anyhow!(other.body_text())),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        let text = rejection.body_text();
        let message = text
            .split_once("query string: ")
            .map_or(text.as_str(), |(_, rest)| rest);
        let (field, code) = rejected_field(message, "query");
        tracing::warn!(%field, code, "query string rejected");
        let mut errors = FieldErrors::new();
        errors.push_owned(field, code);
        AppError::Validation(errors)
    }
}

/// Field path and code out of a serde message such as
/// `items[0].quantity_g: invalid type: ...` or ``missing field `sex` ``.
/// Sequence indices are dropped so paths match the `items.quantity_g` naming.
fn rejected_field(message: &str, fallback: &str) -> (String, &'static str) {
    lazy_static! {
        static ref PATH_PREFIX: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_.\[\]]*): ").unwrap();
        static ref MISSING_FIELD: Regex = Regex::new(r"missing field `([^`]+)`").unwrap();
        static ref INDEX: Regex = Regex::new(r"\[\d+\]").unwrap();
    }

    let (path, rest) = match PATH_PREFIX.captures(message) {
        Some(caps) => {
            let end = caps.get(0).map_or(0, |m| m.end());
            (INDEX.replace_all(&caps[1], "").into_owned(), &message[end..])
        }
        None => (String::new(), message),
    };

    if let Some(caps) = MISSING_FIELD.captures(rest) {
        let field = if path.is_empty() {
            caps[1].to_string()
        } else {
            format!("{path}.{}", &caps[1])
        };
        return (field, "required");
    }
    if path.is_empty() {
        (fallback.to_string(), "invalid_value")
    } else {
        (path, "invalid_value")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match &self {
            AppError::Validation(errors) => {
                let body = json!({
                    "detail": "validation_failed",
                    "code": "VALIDATION_ERROR",
                    "fields": errors,
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            AppError::BadRequest(d) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", d.clone()),
            AppError::Unauthorized(d) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", d.clone()),
            AppError::Forbidden(d) => (StatusCode::FORBIDDEN, "FORBIDDEN", d.clone()),
            AppError::NotFound(d) => (StatusCode::NOT_FOUND, "NOT_FOUND", d.clone()),
            AppError::Conflict(d) => (StatusCode::CONFLICT, "CONFLICT", d.clone()),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal_error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail, "code": code }))).into_response()
    }
}

/// RowNotFound → 404, unique violation on a `uq_*` constraint → 409, anything else → 500.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "not_found".to_string()),
        sqlx::Error::Database(db_err) if is_unique_violation(err) => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("duplicate_value;constraint={constraint}"),
            )
        }
        other => {
            tracing::error!(error = %other, "database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal_error".to_string(),
            )
        }
    }
}

/// Postgres 23505 on one of our named `uq_*` constraints.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505")
                && db_err
                    .constraint()
                    .map(|c| c.starts_with("uq_"))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

/// Postgres 23503: the row is still referenced through a RESTRICT foreign key.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.kind() == sqlx::error::ErrorKind::ForeignKeyViolation
                || db_err.code().as_deref() == Some("23503")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn into_parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_lists_every_field() {
        let mut errors = FieldErrors::new();
        errors.push("height_cm", "must_be_positive");
        errors.push("birth_date", "invalid_date");

        let (status, json) = into_parts(AppError::Validation(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["detail"], "validation_failed");
        assert_eq!(json["fields"][0]["field"], "height_cm");
        assert_eq!(json["fields"][1]["code"], "invalid_date");
    }

    #[tokio::test]
    async fn not_found_keeps_detail_code() {
        let (status, json) = into_parts(AppError::not_found("ingredient_not_found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "ingredient_not_found");
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn row_not_found_maps_to_404() {
        let (status, _) = into_parts(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn internal_error_hides_message() {
        let (status, json) = into_parts(AppError::Internal(anyhow::anyhow!("secret"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["detail"], "internal_error");
    }

    #[test]
    fn serde_messages_name_the_offending_field() {
        assert_eq!(
            rejected_field(r#"height_cm: invalid type: string "abc", expected i64 at line 1 column 20"#, "body"),
            ("height_cm".to_string(), "invalid_value")
        );
        assert_eq!(
            rejected_field("missing field `sex` at line 1 column 2", "body"),
            ("sex".to_string(), "required")
        );
        assert_eq!(
            rejected_field("items[1]: missing field `quantity_g` at line 1 column 80", "body"),
            ("items.quantity_g".to_string(), "required")
        );
        assert_eq!(
            rejected_field("items[0].quantity_g: invalid type: string \"x\", expected f64", "body"),
            ("items.quantity_g".to_string(), "invalid_value")
        );
        assert_eq!(
            rejected_field("invalid type: map, expected a sequence", "body"),
            ("body".to_string(), "invalid_value")
        );
        assert_eq!(
            rejected_field("invalid digit found in string", "query"),
            ("query".to_string(), "invalid_value")
        );
    }

    #[test]
    fn into_result_passes_value_through_when_clean() {
        assert_eq!(FieldErrors::new().into_result(5), Ok(5));
        let mut errors = FieldErrors::new();
        errors.push("name", "required");
        assert!(errors.clone().into_result(5).is_err());
        assert!(errors.has("name"));
    }

    #[derive(Debug)]
    struct PgFailure {
        code: &'static str,
        constraint: &'static str,
    }

    impl std::fmt::Display for PgFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "pg error {}", self.code)
        }
    }

    impl std::error::Error for PgFailure {}

    impl sqlx::error::DatabaseError for PgFailure {
        fn message(&self) -> &str {
            "pg error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            match self.code {
                "23505" => sqlx::error::ErrorKind::UniqueViolation,
                "23503" => sqlx::error::ErrorKind::ForeignKeyViolation,
                _ => sqlx::error::ErrorKind::Other,
            }
        }
    }

    fn pg_error(code: &'static str, constraint: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgFailure { code, constraint }))
    }

    #[test]
    fn restrict_foreign_key_is_told_apart_from_unique() {
        let fk = pg_error("23503", "dish_template_items_ingredient_id_fkey");
        assert!(is_foreign_key_violation(&fk));
        assert!(!is_unique_violation(&fk));

        let dup = pg_error("23505", "uq_ingredients_tenant_name");
        assert!(is_unique_violation(&dup));
        assert!(!is_foreign_key_violation(&dup));

        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
    }
}
