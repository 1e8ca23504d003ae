//! Post CRUD handlers
//!
//! Posts are scoped to their owner. A post that belongs to someone else is
//! reported exactly like a post that does not exist.

use super::PostView;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{IdPath, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use quill_core::{Post, PostDraft, PostStore, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Create or update request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
}

impl From<PostRequest> for PostDraft {
    fn from(request: PostRequest) -> Self {
        Self {
            title: request.title,
            content: request.content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    pub message: String,
    pub post: PostView,
}

impl PostResponse {
    fn new(message: &str, post: Post) -> Self {
        Self {
            message: message.to_string(),
            post: post.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostsResponse {
    pub message: String,
    pub posts: Vec<PostView>,
}

async fn owner(state: &AppState, caller: &AuthenticatedUser) -> Result<User, AppError> {
    state.sessions.current_user(&caller.identity).await
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post".to_string())
}

/// Create a post owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "posts",
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post created", body = PostResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 422, description = "Invalid request body", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_post_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let user = owner(&state, &caller).await?;
    let post = state.store.insert_post(user.id, request.into()).await?;

    tracing::debug!(post_id = post.id, owner_id = user.id, "post created");

    Ok(Json(PostResponse::new("Post created successfully", post)))
}

/// List the caller's posts
#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "posts",
    responses(
        (status = 200, description = "Caller's posts", body = PostsResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_posts_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<PostsResponse>, AppError> {
    let user = owner(&state, &caller).await?;
    let posts = state.store.list_posts_by_owner(user.id).await?;

    Ok(Json(PostsResponse {
        message: "Posts retrieved successfully".to_string(),
        posts: posts.into_iter().map(PostView::from).collect(),
    }))
}

/// Get one of the caller's posts
#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_post_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    IdPath(id): IdPath,
) -> Result<Json<PostResponse>, AppError> {
    let user = owner(&state, &caller).await?;
    let post = state
        .store
        .find_post_for_owner(user.id, id)
        .await?
        .ok_or_else(post_not_found)?;

    Ok(Json(PostResponse::new("Post retrieved successfully", post)))
}

/// Replace the title and content of one of the caller's posts
#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = PostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
        (status = 422, description = "Invalid request body", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_post_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    IdPath(id): IdPath,
    ValidatedJson(request): ValidatedJson<PostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let user = owner(&state, &caller).await?;
    let post = state
        .store
        .update_post_for_owner(user.id, id, request.into())
        .await?
        .ok_or_else(post_not_found)?;

    Ok(Json(PostResponse::new("Post updated successfully", post)))
}

/// Delete one of the caller's posts
#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = "posts",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted", body = PostResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "Post not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_post_handler(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    IdPath(id): IdPath,
) -> Result<Json<PostResponse>, AppError> {
    let user = owner(&state, &caller).await?;
    let post = state
        .store
        .delete_post_for_owner(user.id, id)
        .await?
        .ok_or_else(post_not_found)?;

    Ok(Json(PostResponse::new("Post deleted successfully", post)))
}
