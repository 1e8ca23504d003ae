//! Admin user management handlers
//!
//! Every handler passes the caller through the admin gate before touching
//! the store.

use super::{MessageResponse, UserView};
use crate::audit::{audit_log, AuditEvent};
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::IdPath;
use crate::state::AppState;
use axum::{extract::State, Json};
use quill_core::{Role, UserStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UsersResponse {
    pub message: String,
    pub users: Vec<UserView>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PromoteResponse {
    pub message: String,
    pub user: UserView,
}

/// List every account that is not an admin
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "Non-admin users", body = UsersResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Admins only", body = crate::error::ApiError),
        (status = 404, description = "Admin not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<UsersResponse>, AppError> {
    caller.require(&state, Role::Admin, "admin:list_users").await?;

    let users = state.store.list_users_excluding_role(Role::Admin).await?;

    Ok(Json(UsersResponse {
        message: "Get users".to_string(),
        users: users.into_iter().map(UserView::from).collect(),
    }))
}

/// Promote a user to admin
///
/// Promoting an account that is already an admin changes nothing.
#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{id}/promote",
    tag = "admin",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User promoted", body = PromoteResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Admins only", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn promote_user_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    IdPath(id): IdPath,
) -> Result<Json<PromoteResponse>, AppError> {
    let admin = caller
        .require(&state, Role::Admin, "admin:promote_user")
        .await?;

    let target = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    let user = if target.is_admin() {
        target
    } else {
        let promoted = state.store.update_user_role(id, Role::Admin).await?;
        audit_log(&AuditEvent::RoleChange {
            actor_email: admin.email,
            target_user_id: promoted.id,
            target_email: promoted.email.clone(),
            new_role: promoted.role.to_string(),
            ip_address: caller.meta.ip_address.clone(),
        });
        promoted
    };

    Ok(Json(PromoteResponse {
        message: format!("{} promoted to admin", user.email),
        user: user.into(),
    }))
}

/// Delete a user and their posts
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 403, description = "Admins only", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    IdPath(id): IdPath,
) -> Result<Json<MessageResponse>, AppError> {
    let admin = caller
        .require(&state, Role::Admin, "admin:delete_user")
        .await?;

    state.store.delete_user(id).await?;

    audit_log(&AuditEvent::UserDeleted {
        actor_email: admin.email,
        target_user_id: id,
        ip_address: caller.meta.ip_address.clone(),
    });

    Ok(Json(MessageResponse::new("User deleted successfully")))
}
