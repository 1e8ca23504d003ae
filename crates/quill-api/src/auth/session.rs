//! Session lifecycle: registration, login, refresh and logout
//!
//! Sessions are stateless. Nothing about an issued token is stored
//! server-side, so logout only clears the client's refresh cookie and a
//! refresh token stays valid until it expires.

use super::gate::{refresh_identity, AuthError, Identity};
use super::jwt::{Claims, TokenCodec};
use super::password::{hash_password_with_config, verify_password, PasswordConfig, PasswordError};
use crate::audit::{audit_log, AuditEvent, RequestMeta};
use crate::error::AppError;
use axum::http::HeaderMap;
use quill_core::{AuthConfig, NewUser, Store, User, UserStore};
use std::sync::Arc;
use std::time::Duration;

/// Tokens issued by a successful login
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, login, refresh and logout over a user store
pub struct SessionManager {
    store: Arc<dyn Store>,
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
    password_config: PasswordConfig,
    unify_login_errors: bool,
    /// Verified against on unknown emails when login errors are unified
    dummy_hash: Option<String>,
}

const DUMMY_PASSWORD: &str = "quill-dummy-password";

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, codec: TokenCodec, auth: &AuthConfig) -> Self {
        let password_config = PasswordConfig::default();
        let dummy_hash = dummy_hash(auth.unify_login_errors, &password_config);

        Self {
            store,
            codec,
            access_ttl: Duration::from_secs(auth.access_token_mins.saturating_mul(60)),
            refresh_ttl: Duration::from_secs(auth.refresh_token_days.saturating_mul(24 * 60 * 60)),
            password_config,
            unify_login_errors: auth.unify_login_errors,
            dummy_hash,
        }
    }

    /// Override the Argon2 parameters used for new hashes
    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.dummy_hash = dummy_hash(self.unify_login_errors, &config);
        self.password_config = config;
        self
    }

    /// Create an account with the `user` role
    ///
    /// Issues no tokens. A duplicate email is rejected before hashing, and
    /// again by the store if two registrations race.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<User, AppError> {
        if self.store.find_user_by_email(email).await?.is_some() {
            audit_registration_failure(email, "Email already registered", meta);
            return Err(AppError::AlreadyExists(
                "Email already registered".to_string(),
            ));
        }

        let password_hash = self.hash(password).await?;

        let user = match self
            .store
            .insert_user(NewUser::new(email, name, password_hash))
            .await
        {
            Ok(user) => user,
            Err(e) => {
                audit_registration_failure(email, &e.to_string(), meta);
                return Err(e.into());
            }
        };

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        });
        tracing::info!(user_id = user.id, "user registered");

        Ok(user)
    }

    /// Verify credentials and issue an access and a refresh token
    ///
    /// An unknown email answers 404 unless login errors are unified, in
    /// which case it answers the same 401 as a wrong password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<LoginTokens, AppError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            audit_login_failure(email, "Unknown email", meta);
            if !self.unify_login_errors {
                return Err(AppError::NotFound("User".to_string()));
            }
            // Spend the same Argon2 work as a real mismatch
            if let Some(hash) = &self.dummy_hash {
                let _ = self.verify(hash, password).await?;
            }
            return Err(AppError::invalid_credentials());
        };

        if let Err(e) = self.verify(&user.password_hash, password).await? {
            audit_login_failure(email, &e.to_string(), meta);
            return Err(AppError::invalid_credentials());
        }

        let claims = Claims::for_subject(&user.email).with_role(user.role);
        let access_token = self.issue(claims.clone(), self.access_ttl)?;
        let refresh_token = self.issue(claims, self.refresh_ttl)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        });

        Ok(LoginTokens {
            access_token,
            refresh_token,
        })
    }

    /// Mint a new access token from the refresh cookie in `headers`
    ///
    /// The new token carries the subject only. The refresh token itself is
    /// neither rotated nor checked against the store.
    pub async fn refresh(&self, headers: &HeaderMap, meta: &RequestMeta) -> Result<String, AppError> {
        let identity = match refresh_identity(headers, &self.codec) {
            Ok(identity) => identity,
            Err(e @ AuthError::InvalidRefreshToken(_)) => {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address: meta.ip_address.clone(),
                    user_agent: meta.user_agent.clone(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let access_token = self.issue(Claims::for_subject(&identity.email), self.access_ttl)?;

        audit_log(&AuditEvent::TokenRefresh {
            email: identity.email,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
        });

        Ok(access_token)
    }

    /// Record the logout; the caller clears the refresh cookie
    pub fn logout(&self, identity: &Identity, meta: &RequestMeta) {
        audit_log(&AuditEvent::Logout {
            email: identity.email.clone(),
            ip_address: meta.ip_address.clone(),
        });
    }

    /// Stored account behind an authenticated identity
    pub async fn current_user(&self, identity: &Identity) -> Result<User, AppError> {
        self.store
            .find_user_by_email(&identity.email)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    fn issue(&self, claims: Claims, ttl: Duration) -> Result<String, AppError> {
        self.codec
            .encode(claims, ttl)
            .map_err(|e| AppError::Internal(format!("Failed to issue token: {e}")))
    }

    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let config = self.password_config.clone();

        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Outer error: the blocking task died. Inner: the password did not match.
    async fn verify(
        &self,
        hash: &str,
        password: &str,
    ) -> Result<Result<(), PasswordError>, AppError> {
        let hash = hash.to_string();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))
    }
}

fn dummy_hash(enabled: bool, config: &PasswordConfig) -> Option<String> {
    if !enabled {
        return None;
    }
    match hash_password_with_config(DUMMY_PASSWORD, config) {
        Ok(hash) => Some(hash),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build dummy password hash");
            None
        }
    }
}

fn audit_registration_failure(email: &str, reason: &str, meta: &RequestMeta) {
    audit_log(&AuditEvent::RegistrationFailure {
        email: email.to_string(),
        reason: reason.to_string(),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
    });
}

fn audit_login_failure(email: &str, reason: &str, meta: &RequestMeta) {
    audit_log(&AuditEvent::LoginFailure {
        email: email.to_string(),
        reason: reason.to_string(),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use quill_core::{MemoryStore, Role};

    const SECRET: &str = "session-secret";

    fn manager_with(store: Arc<MemoryStore>, auth: AuthConfig) -> SessionManager {
        SessionManager::new(store, TokenCodec::new(SECRET), &auth).with_password_config(
            PasswordConfig {
                memory_cost: 1024,
                time_cost: 1,
                parallelism: 1,
                output_len: Some(32),
            },
        )
    }

    fn manager() -> (Arc<MemoryStore>, SessionManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone(), AuthConfig::default());
        (store, manager)
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("refresh_token={token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_register_creates_plain_user() {
        let (store, sessions) = manager();
        let meta = RequestMeta::default();

        let user = sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();

        assert_eq!(user.role, Role::User);
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert_ne!(user.password_hash, "password123");
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (store, sessions) = manager();
        let meta = RequestMeta::default();

        sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();
        let result = sessions
            .register("alice@example.com", "Alice Again", "password456", &meta)
            .await;

        assert!(matches!(result, Err(AppError::AlreadyExists(_))));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_login_issues_tokens_for_the_subject() {
        let (_, sessions) = manager();
        let meta = RequestMeta::default();
        sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();

        let tokens = sessions
            .login("alice@example.com", "password123", &meta)
            .await
            .unwrap();

        let codec = TokenCodec::new(SECRET);
        let access = codec.decode(&tokens.access_token).unwrap();
        let refresh = codec.decode(&tokens.refresh_token).unwrap();
        assert_eq!(access.sub, "alice@example.com");
        assert_eq!(access.role, Some(Role::User));
        assert_eq!(refresh.sub, "alice@example.com");
        assert!(refresh.exp > access.exp);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (_, sessions) = manager();
        let meta = RequestMeta::default();
        sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();

        assert!(matches!(
            sessions.login("alice@example.com", "wrong-password", &meta).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert!(matches!(
            sessions.login("nobody@example.com", "password123", &meta).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unified_login_errors() {
        let store = Arc::new(MemoryStore::new());
        let sessions = manager_with(
            store,
            AuthConfig {
                unify_login_errors: true,
                ..AuthConfig::default()
            },
        );

        assert!(matches!(
            sessions
                .login("nobody@example.com", "password123", &RequestMeta::default())
                .await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_dummy_hash_follows_password_config() {
        let store = Arc::new(MemoryStore::new());
        let unified = manager_with(
            store.clone(),
            AuthConfig {
                unify_login_errors: true,
                ..AuthConfig::default()
            },
        );
        let hash = unified.dummy_hash.as_deref().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=1024,t=1,p=1"));

        let plain = manager_with(store, AuthConfig::default());
        assert!(plain.dummy_hash.is_none());
    }

    #[tokio::test]
    async fn test_unified_login_unknown_email_costs_a_verify() {
        let store = Arc::new(MemoryStore::new());
        let sessions = SessionManager::new(
            store,
            TokenCodec::new(SECRET),
            &AuthConfig {
                unify_login_errors: true,
                ..AuthConfig::default()
            },
        )
        .with_password_config(PasswordConfig {
            memory_cost: 8192,
            time_cost: 2,
            parallelism: 1,
            output_len: Some(32),
        });
        let meta = RequestMeta::default();
        sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let known = sessions.login("alice@example.com", "wrong-password", &meta).await;
        let known_elapsed = started.elapsed();

        let started = std::time::Instant::now();
        let unknown = sessions.login("nobody@example.com", "wrong-password", &meta).await;
        let unknown_elapsed = started.elapsed();

        assert!(matches!(known, Err(AppError::Unauthenticated(_))));
        assert!(matches!(unknown, Err(AppError::Unauthenticated(_))));
        assert!(
            unknown_elapsed * 4 >= known_elapsed,
            "unknown {unknown_elapsed:?} vs known {known_elapsed:?}"
        );
    }

    #[test]
    fn test_huge_ttls_saturate() {
        let sessions = SessionManager::new(
            Arc::new(MemoryStore::new()),
            TokenCodec::new(SECRET),
            &AuthConfig {
                access_token_mins: u64::MAX,
                refresh_token_days: u64::MAX,
                ..AuthConfig::default()
            },
        );
        assert_eq!(sessions.access_ttl, Duration::from_secs(u64::MAX));
        assert_eq!(sessions.refresh_ttl, Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_cookie() {
        let (_, sessions) = manager();
        let expired = TokenCodec::new(SECRET)
            .encode_at(
                Claims::for_subject("alice@example.com"),
                Duration::from_secs(60),
                1_000_000,
            )
            .unwrap();

        assert!(matches!(
            sessions.refresh(&cookie_headers(&expired), &RequestMeta::default()).await,
            Err(AppError::Unauthenticated(ref msg)) if msg == crate::error::INVALID_CREDENTIALS
        ));
    }

    #[tokio::test]
    async fn test_refresh_mints_subject_only_token() {
        let (_, sessions) = manager();
        let meta = RequestMeta::default();
        sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();
        let tokens = sessions
            .login("alice@example.com", "password123", &meta)
            .await
            .unwrap();

        let access = sessions
            .refresh(&cookie_headers(&tokens.refresh_token), &meta)
            .await
            .unwrap();

        let claims = TokenCodec::new(SECRET).decode(&access).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
        assert_eq!(claims.role, None);
    }

    #[tokio::test]
    async fn test_refresh_rejections() {
        let (_, sessions) = manager();
        let meta = RequestMeta::default();

        assert!(matches!(
            sessions.refresh(&HeaderMap::new(), &meta).await,
            Err(AppError::Unauthenticated(ref msg)) if msg == "Not authenticated"
        ));

        let foreign = TokenCodec::new("another-secret")
            .encode(Claims::for_subject("alice@example.com"), Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            sessions.refresh(&cookie_headers(&foreign), &meta).await,
            Err(AppError::Unauthenticated(ref msg)) if msg == crate::error::INVALID_CREDENTIALS
        ));
    }

    #[tokio::test]
    async fn test_current_user() {
        let (_, sessions) = manager();
        let meta = RequestMeta::default();
        sessions
            .register("alice@example.com", "Alice", "password123", &meta)
            .await
            .unwrap();

        let alice = Identity {
            email: "alice@example.com".to_string(),
        };
        assert_eq!(sessions.current_user(&alice).await.unwrap().name, "Alice");

        let ghost = Identity {
            email: "ghost@example.com".to_string(),
        };
        assert!(matches!(
            sessions.current_user(&ghost).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_ttls_follow_config() {
        let sessions = SessionManager::new(
            Arc::new(MemoryStore::new()),
            TokenCodec::new(SECRET),
            &AuthConfig::default(),
        );
        assert_eq!(sessions.access_ttl, Duration::from_secs(30 * 60));
        assert_eq!(sessions.refresh_ttl, Duration::from_secs(7 * 24 * 3600));
    }
}
