//! Authorization gate
//!
//! Identity comes from a bearer token (or the refresh cookie for
//! `/auth/refresh`); the role is always re-read from the store. Handlers
//! compose the two steps explicitly:
//!
//! ```ignore
//! async fn list_users(
//!     State(state): State<Arc<AppState>>,
//!     caller: AuthenticatedUser,
//! ) -> Result<Json<UsersResponse>, AppError> {
//!     caller.require(&state, Role::Admin, "admin:list_users").await?;
//!     // ...
//! }
//! ```

use super::cookie::{read_cookie, REFRESH_COOKIE};
use super::jwt::{JwtError, TokenCodec};
use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use quill_core::{CoreError, Role, User, UserStore};
use std::sync::Arc;
use thiserror::Error;

/// Message for a request that carries no credential at all
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Verified subject of a token
///
/// The token's role claim is deliberately not carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

/// Authentication and authorization failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Missing refresh token cookie")]
    MissingRefreshCookie,

    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(JwtError),

    /// The authenticated account no longer exists
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Insufficient permissions, {0} required")]
    InsufficientPermissions(Role),

    #[error(transparent)]
    Store(#[from] CoreError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuthHeader | AuthError::MissingRefreshCookie => {
                AppError::Unauthenticated(NOT_AUTHENTICATED.to_string())
            }
            AuthError::InvalidAuthHeader
            | AuthError::InvalidToken(_)
            | AuthError::InvalidRefreshToken(_) => AppError::invalid_credentials(),
            AuthError::NotFound(resource) => AppError::NotFound(resource.to_string()),
            AuthError::InsufficientPermissions(Role::Admin) => {
                AppError::Forbidden("Admins only".to_string())
            }
            AuthError::InsufficientPermissions(_) => {
                AppError::Forbidden("Insufficient permissions".to_string())
            }
            AuthError::Store(e) => AppError::from(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Identity from `Authorization: Bearer <token>`
///
/// The scheme is matched case-insensitively.
pub fn authenticate(headers: &HeaderMap, codec: &TokenCodec) -> Result<Identity, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (scheme, token) = auth_header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    let claims = codec.decode(token)?;
    Ok(Identity { email: claims.sub })
}

/// Identity from the refresh token cookie
pub fn refresh_identity(headers: &HeaderMap, codec: &TokenCodec) -> Result<Identity, AuthError> {
    let token = read_cookie(headers, REFRESH_COOKIE).ok_or(AuthError::MissingRefreshCookie)?;
    let claims = codec
        .decode(&token)
        .map_err(AuthError::InvalidRefreshToken)?;
    Ok(Identity { email: claims.sub })
}

/// Resolve `identity` to a stored user holding at least `required`
pub async fn authorize<S>(store: &S, identity: &Identity, required: Role) -> Result<User, AuthError>
where
    S: UserStore + ?Sized,
{
    let user = store
        .find_user_by_email(&identity.email)
        .await?
        .ok_or(match required {
            Role::Admin => AuthError::NotFound("Admin"),
            Role::User => AuthError::NotFound("User"),
        })?;

    if user.role < required {
        return Err(AuthError::InsufficientPermissions(required));
    }

    Ok(user)
}

/// Extractor for routes that need a valid bearer token
///
/// Rejections are audited as invalid tokens, except a request with no
/// `Authorization` header at all.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    pub meta: RequestMeta,
}

impl AuthenticatedUser {
    pub fn email(&self) -> &str {
        &self.identity.email
    }

    /// [`authorize`] against the app store, auditing denials
    pub async fn require(
        &self,
        state: &AppState,
        required: Role,
        resource: &str,
    ) -> Result<User, AuthError> {
        let result = authorize(state.store.as_ref(), &self.identity, required).await;

        if let Err(AuthError::NotFound(_) | AuthError::InsufficientPermissions(_)) = &result {
            audit_log(&AuditEvent::AccessDenied {
                email: Some(self.identity.email.clone()),
                resource: resource.to_string(),
                required_role: Some(required.to_string()),
                ip_address: self.meta.ip_address.clone(),
                user_agent: self.meta.user_agent.clone(),
            });
        }

        result
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let meta = RequestMeta::from_headers(&parts.headers);

        match authenticate(&parts.headers, &state.codec) {
            Ok(identity) => Ok(Self { identity, meta }),
            Err(AuthError::MissingAuthHeader) => Err(AuthError::MissingAuthHeader),
            Err(e) => {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address: meta.ip_address,
                    user_agent: meta.user_agent,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
