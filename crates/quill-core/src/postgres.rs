//! PostgreSQL store
//!
//! Users and posts in PostgreSQL using SQLx. Each mutation is a single
//! statement, so it commits in its own implicit transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::store::{PostStore, UserStore};
use crate::{CoreError, NewUser, Post, PostDraft, Result, Role, User};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        owner_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS posts_owner_id_idx ON posts (owner_id)",
];

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::DatabaseError(format!("Failed to create schema: {e}")))?;
        }
        tracing::debug!("database schema ready");
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    name: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            created_at: row.created_at,
        })
    }
}

/// Post row from database
#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    owner_id: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            title: row.title,
            content: row.content,
            owner_id: row.owner_id,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, password_hash, role, created_at";

fn db_error(action: &str, e: sqlx::Error) -> CoreError {
    CoreError::DatabaseError(format!("Failed to {action}: {e}"))
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("fetch user", e))?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("fetch user", e))?;

        row.map(User::try_from).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (email, name, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                CoreError::AlreadyExists(format!("User {}", user.email))
            }
            other => db_error("create user", other),
        })?;

        User::try_from(row)
    }

    async fn update_user_role(&self, id: i64, role: Role) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update user role", e))?;

        row.ok_or_else(|| CoreError::NotFound("User".to_string()))
            .and_then(User::try_from)
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete user", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn list_users_excluding_role(&self, role: Role) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role <> $1 ORDER BY id"
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list users", e))?;

        rows.into_iter().map(User::try_from).collect()
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, owner_id: i64, draft: PostDraft) -> Result<Post> {
        let row: PostRow = sqlx::query_as(
            r#"
            INSERT INTO posts (title, content, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, content, owner_id
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                CoreError::NotFound("User".to_string())
            }
            other => db_error("create post", other),
        })?;

        Ok(row.into())
    }

    async fn list_posts_by_owner(&self, owner_id: i64) -> Result<Vec<Post>> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT id, title, content, owner_id FROM posts WHERE owner_id = $1 ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list posts", e))?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn find_post_for_owner(&self, owner_id: i64, post_id: i64) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as(
            "SELECT id, title, content, owner_id FROM posts WHERE id = $1 AND owner_id = $2",
        )
        .bind(post_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch post", e))?;

        Ok(row.map(Post::from))
    }

    async fn update_post_for_owner(
        &self,
        owner_id: i64,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            UPDATE posts SET title = $3, content = $4
            WHERE id = $1 AND owner_id = $2
            RETURNING id, title, content, owner_id
            "#,
        )
        .bind(post_id)
        .bind(owner_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("update post", e))?;

        Ok(row.map(Post::from))
    }

    async fn delete_post_for_owner(&self, owner_id: i64, post_id: i64) -> Result<Option<Post>> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            DELETE FROM posts
            WHERE id = $1 AND owner_id = $2
            RETURNING id, title, content, owner_id
            "#,
        )
        .bind(post_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("delete post", e))?;

        Ok(row.map(Post::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_row_conversion() {
        let row = UserRow {
            id: 3,
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password_hash: "hash".to_string(),
            role: "admin".to_string(),
            created_at: Utc::now(),
        };

        let user = User::try_from(row).unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn test_user_row_with_unknown_role() {
        let row = UserRow {
            id: 3,
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            password_hash: "hash".to_string(),
            role: "superuser".to_string(),
            created_at: Utc::now(),
        };

        assert!(User::try_from(row).is_err());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_round_trip_against_postgres() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgStore::connect(&url, 2).await.unwrap();
        store.init_schema().await.unwrap();

        let email = format!("pg-{}@example.com", Utc::now().timestamp_nanos_opt().unwrap_or(0));
        let user = store
            .insert_user(NewUser::new(email.clone(), "Pg", "hash"))
            .await
            .unwrap();
        let duplicate = store.insert_user(NewUser::new(email, "Pg", "hash")).await;
        assert!(matches!(duplicate, Err(CoreError::AlreadyExists(_))));

        let post = store
            .insert_post(
                user.id,
                PostDraft {
                    title: "t".to_string(),
                    content: "c".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(post.owner_id, user.id);

        store.delete_user(user.id).await.unwrap();
        assert!(store
            .find_post_for_owner(user.id, post.id)
            .await
            .unwrap()
            .is_none());
    }
}
