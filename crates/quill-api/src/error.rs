//! API error handling

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use quill_core::CoreError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Message returned for every token or credential failure
pub const INVALID_CREDENTIALS: &str = "Invalid authentication credentials";

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed or invalid request body (422)
    Validation(String),
    BadRequest(String),
    /// Duplicate resource, e.g. a registered email (400)
    AlreadyExists(String),
    /// Missing or invalid credentials (401)
    Unauthenticated(String),
    Forbidden(String),
    /// Missing resource; the payload names it ("User", "Post", ...)
    NotFound(String),
    Internal(String),
    Database(String),
}

impl AppError {
    /// The generic 401 used for all token and password failures
    pub fn invalid_credentials() -> Self {
        AppError::Unauthenticated(INVALID_CREDENTIALS.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::new("VALIDATION_ERROR", "Invalid request body").with_details(msg),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::AlreadyExists(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("ALREADY_EXISTS", msg))
            }
            AppError::Unauthenticated(msg) => {
                let mut response =
                    (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized(msg))).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, ApiError::forbidden(msg)),
            AppError::NotFound(resource) => (StatusCode::NOT_FOUND, ApiError::not_found(&resource)),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("DATABASE_ERROR", "Database operation failed"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(resource) => AppError::NotFound(resource),
            CoreError::AlreadyExists(_) => {
                AppError::AlreadyExists("Email already registered".to_string())
            }
            CoreError::DatabaseError(msg) => AppError::Database(msg),
            CoreError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_codes() {
        let cases = vec![
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::AlreadyExists("x".into()), StatusCode::BAD_REQUEST),
            (AppError::invalid_credentials(), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("User".into()), StatusCode::NOT_FOUND),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_unauthorized_sets_challenge_header() {
        let response = AppError::invalid_credentials().into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let json = body_json(response).await;
        assert_eq!(json["code"], "UNAUTHORIZED");
        assert_eq!(json["message"], INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_internal_details_not_exposed() {
        let response = AppError::Database("connection refused at 10.0.0.5".into()).into_response();
        let json = body_json(response).await;
        assert_eq!(json["code"], "DATABASE_ERROR");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_not_found_message() {
        let json = body_json(AppError::NotFound("Post".into()).into_response()).await;
        assert_eq!(json["message"], "Post not found");
    }

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            AppError::from(CoreError::NotFound("User".into())),
            AppError::NotFound(ref r) if r == "User"
        ));
        assert!(matches!(
            AppError::from(CoreError::AlreadyExists("User a@b.c".into())),
            AppError::AlreadyExists(_)
        ));
        assert!(matches!(
            AppError::from(CoreError::DatabaseError("boom".into())),
            AppError::Database(_)
        ));
    }
}
