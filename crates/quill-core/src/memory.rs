//! In-memory store
//!
//! Backs tests and `--memory` runs. Each mutating call takes the write lock
//! once, so it behaves like a single transaction.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::store::{PostStore, UserStore};
use crate::{CoreError, NewUser, Post, PostDraft, Result, Role, User};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    next_user_id: i64,
    next_post_id: i64,
}

/// Store holding users and posts in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of stored posts
    pub async fn post_count(&self) -> usize {
        self.tables.read().await.posts.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(CoreError::AlreadyExists(format!("User {}", user.email)));
        }

        tables.next_user_id += 1;
        let stored = User {
            id: tables.next_user_id,
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_user_role(&self, id: i64, role: Role) -> Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("User".to_string()))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(CoreError::NotFound("User".to_string()));
        }
        tables.posts.retain(|_, post| post.owner_id != id);
        Ok(())
    }

    async fn list_users_excluding_role(&self, role: Role) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.role != role)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, owner_id: i64, draft: PostDraft) -> Result<Post> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&owner_id) {
            return Err(CoreError::NotFound("User".to_string()));
        }

        tables.next_post_id += 1;
        let post = Post {
            id: tables.next_post_id,
            title: draft.title,
            content: draft.content,
            owner_id,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn list_posts_by_owner(&self, owner_id: i64) -> Result<Vec<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_post_for_owner(&self, owner_id: i64, post_id: i64) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .get(&post_id)
            .filter(|p| p.owner_id == owner_id)
            .cloned())
    }

    async fn update_post_for_owner(
        &self,
        owner_id: i64,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;
        match tables.posts.get_mut(&post_id) {
            Some(post) if post.owner_id == owner_id => {
                post.title = draft.title;
                post.content = draft.content;
                Ok(Some(post.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_post_for_owner(&self, owner_id: i64, post_id: i64) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .posts
            .get(&post_id)
            .is_some_and(|p| p.owner_id == owner_id);
        if !owned {
            return Ok(None);
        }
        Ok(tables.posts.remove(&post_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> PostDraft {
        PostDraft {
            title: title.to_string(),
            content: format!("{title} body"),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_user() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser::new("alice@example.com", "Alice", "hash"))
            .await
            .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.role, Role::User);

        let found = store.find_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(found, Some(user.clone()));
        assert_eq!(store.find_user_by_id(1).await.unwrap(), Some(user));
        assert!(store.find_user_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store
            .insert_user(NewUser::new("alice@example.com", "Alice", "hash"))
            .await
            .unwrap();

        let result = store
            .insert_user(NewUser::new("alice@example.com", "Other", "hash"))
            .await;
        assert!(matches!(result, Err(CoreError::AlreadyExists(_))));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_role_and_missing_user() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(NewUser::new("alice@example.com", "Alice", "hash"))
            .await
            .unwrap();

        let promoted = store.update_user_role(user.id, Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let missing = store.update_user_role(42, Role::Admin).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_excludes_admins() {
        let store = MemoryStore::new();
        store
            .insert_user(NewUser::new("admin@example.com", "Admin", "h").with_role(Role::Admin))
            .await
            .unwrap();
        store
            .insert_user(NewUser::new("alice@example.com", "Alice", "h"))
            .await
            .unwrap();
        store
            .insert_user(NewUser::new("bob@example.com", "Bob", "h"))
            .await
            .unwrap();

        let users = store.list_users_excluding_role(Role::Admin).await.unwrap();
        let emails: Vec<_> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["alice@example.com", "bob@example.com"]);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_posts() {
        let store = MemoryStore::new();
        let alice = store
            .insert_user(NewUser::new("alice@example.com", "Alice", "h"))
            .await
            .unwrap();
        let bob = store
            .insert_user(NewUser::new("bob@example.com", "Bob", "h"))
            .await
            .unwrap();
        store.insert_post(alice.id, draft("one")).await.unwrap();
        store.insert_post(bob.id, draft("two")).await.unwrap();

        store.delete_user(alice.id).await.unwrap();
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.post_count().await, 1);

        let again = store.delete_user(alice.id).await;
        assert!(matches!(again, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_posts_scoped_to_owner() {
        let store = MemoryStore::new();
        let alice = store
            .insert_user(NewUser::new("alice@example.com", "Alice", "h"))
            .await
            .unwrap();
        let bob = store
            .insert_user(NewUser::new("bob@example.com", "Bob", "h"))
            .await
            .unwrap();
        let post = store.insert_post(alice.id, draft("hello")).await.unwrap();

        assert!(store.find_post_for_owner(bob.id, post.id).await.unwrap().is_none());
        assert!(store
            .update_post_for_owner(bob.id, post.id, draft("hijack"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .delete_post_for_owner(bob.id, post.id)
            .await
            .unwrap()
            .is_none());

        let updated = store
            .update_post_for_owner(alice.id, post.id, draft("edited"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "edited");
        assert_eq!(store.list_posts_by_owner(alice.id).await.unwrap().len(), 1);
        assert!(store.list_posts_by_owner(bob.id).await.unwrap().is_empty());

        let deleted = store.delete_post_for_owner(alice.id, post.id).await.unwrap();
        assert_eq!(deleted.map(|p| p.id), Some(post.id));
        assert_eq!(store.post_count().await, 0);
    }

    #[tokio::test]
    async fn test_post_for_missing_owner() {
        let store = MemoryStore::new();
        let result = store.insert_post(7, draft("orphan")).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }
}
