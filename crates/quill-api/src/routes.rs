//! API route definitions and the OpenAPI document

use crate::error::ApiError;
use crate::handlers::{admin, auth, health, posts, MessageResponse, PostView, UserView};
use crate::state::AppState;
use axum::{
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Create API v1 routes
///
/// Authentication is enforced per handler by the `AuthenticatedUser`
/// extractor; admin routes additionally pass the admin gate.
pub fn api_routes() -> Router<Arc<AppState>> {
    // logout and user take a bearer token, the rest do not
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/user", get(auth::me_handler));

    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users_handler))
        .route("/admin/users/:id/promote", patch(admin::promote_user_handler))
        .route("/admin/users/:id", delete(admin::delete_user_handler));

    let post_routes = Router::new()
        .route(
            "/posts",
            post(posts::create_post_handler).get(posts::list_posts_handler),
        )
        .route(
            "/posts/:id",
            get(posts::get_post_handler)
                .put(posts::update_post_handler)
                .delete(posts::delete_post_handler),
        );

    Router::new()
        .merge(auth_routes)
        .merge(admin_routes)
        .merge(post_routes)
}

/// Serve the generated OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Quill API", description = "Multi-tenant blogging backend"),
    paths(
        health::health_check,
        auth::register_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::me_handler,
        admin::list_users_handler,
        admin::promote_user_handler,
        admin::delete_user_handler,
        posts::create_post_handler,
        posts::list_posts_handler,
        posts::get_post_handler,
        posts::update_post_handler,
        posts::delete_post_handler,
    ),
    components(schemas(
        ApiError,
        MessageResponse,
        UserView,
        PostView,
        health::HealthResponse,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RegisterResponse,
        auth::TokenResponse,
        auth::ProfileResponse,
        admin::UsersResponse,
        admin::PromoteResponse,
        posts::PostRequest,
        posts::PostResponse,
        posts::PostsResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Registration, login and sessions"),
        (name = "admin", description = "User management, admins only"),
        (name = "posts", description = "Per-owner posts"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
