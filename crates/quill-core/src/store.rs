//! Storage traits
//!
//! The API layer only talks to persistence through these traits, so the
//! PostgreSQL store and the in-memory store are interchangeable.

use async_trait::async_trait;

use crate::{NewUser, Post, PostDraft, Result, Role, User};

/// Credential store operations
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by login email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by id
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Insert a new user
    ///
    /// Fails with `CoreError::AlreadyExists` when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Set the role of an existing user and return the updated record
    ///
    /// Fails with `CoreError::NotFound` when no user has that id.
    async fn update_user_role(&self, id: i64, role: Role) -> Result<User>;

    /// Delete a user and every post they own
    ///
    /// Fails with `CoreError::NotFound` when no user has that id.
    async fn delete_user(&self, id: i64) -> Result<()>;

    /// All users whose role differs from `role`, ordered by id
    async fn list_users_excluding_role(&self, role: Role) -> Result<Vec<User>>;
}

/// Post store operations
///
/// Every lookup is scoped to an owner; a post owned by someone else is
/// indistinguishable from a missing one.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, owner_id: i64, draft: PostDraft) -> Result<Post>;

    async fn list_posts_by_owner(&self, owner_id: i64) -> Result<Vec<Post>>;

    async fn find_post_for_owner(&self, owner_id: i64, post_id: i64) -> Result<Option<Post>>;

    /// Replace title and content; `None` if the owner has no such post
    async fn update_post_for_owner(
        &self,
        owner_id: i64,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<Option<Post>>;

    /// Remove the post and return it; `None` if the owner has no such post
    async fn delete_post_for_owner(&self, owner_id: i64, post_id: i64) -> Result<Option<Post>>;
}

/// Combined store handed to the API layer
pub trait Store: UserStore + PostStore {}

impl<T: UserStore + PostStore> Store for T {}
