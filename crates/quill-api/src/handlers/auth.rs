//! Authentication API handlers
//!
//! Login returns the access token in the body and the refresh token in an
//! HttpOnly cookie; `/auth/refresh` reads that cookie back.

use super::MessageResponse;
use crate::audit::RequestMeta;
use crate::auth::{clear_refresh_cookie, refresh_cookie, AuthenticatedUser};
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
}

/// Access token response for login and refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer"
    pub token_type: String,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// The authenticated user's profile
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Register a new user account
///
/// New accounts get the `user` role. No tokens are issued.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Email already registered", body = crate::error::ApiError),
        (status = 422, description = "Invalid request body", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let meta = RequestMeta::from_headers(&headers);
    let user = state
        .sessions
        .register(&request.email, &request.name, &request.password, &meta)
        .await?;

    Ok(Json(RegisterResponse {
        message: "User registered successfully".to_string(),
        email: user.email,
    }))
}

/// Login with email and password
///
/// Sets the `refresh_token` cookie on success.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 422, description = "Invalid request body", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meta = RequestMeta::from_headers(&headers);
    let tokens = state
        .sessions
        .login(&request.email, &request.password, &meta)
        .await?;

    let cookie = refresh_cookie(
        &tokens.refresh_token,
        state.config.auth.refresh_cookie_max_age_secs,
    )
    .map_err(|e| AppError::Internal(format!("Failed to build refresh cookie: {e}")))?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse::bearer(tokens.access_token)),
    ))
}

/// Exchange the refresh cookie for a new access token
///
/// The cookie is left untouched.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 401, description = "Missing or invalid refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    let meta = RequestMeta::from_headers(&headers);
    let access_token = state.sessions.refresh(&headers, &meta).await?;

    Ok(Json(TokenResponse::bearer(access_token)))
}

/// Logout and clear the refresh cookie
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> impl IntoResponse {
    state.sessions.logout(&caller.identity, &caller.meta);

    (
        [(header::SET_COOKIE, clear_refresh_cookie())],
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/user",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.sessions.current_user(&caller.identity).await?;

    Ok(Json(ProfileResponse {
        name: user.name,
        email: user.email,
        role: user.role.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_rules() {
        let valid = RegisterRequest {
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            password: "short".to_string(),
            ..valid.clone()
        };
        assert!(short_password.validate().is_err());

        let empty_name = RegisterRequest {
            name: String::new(),
            ..valid
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_token_response_shape() {
        let json = serde_json::to_value(TokenResponse::bearer("abc".to_string())).unwrap();
        assert_eq!(json["access_token"], "abc");
        assert_eq!(json["token_type"], "bearer");
    }
}
