//! Application state management

use crate::auth::{PasswordConfig, SessionManager, TokenCodec};
use quill_core::{AppConfig, Store};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Persistence for users and posts
    pub store: Arc<dyn Store>,
    /// Codec for bearer and refresh tokens, keyed by the configured secret
    pub codec: TokenCodec,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        let codec = TokenCodec::new(&config.auth.jwt_secret);
        let sessions = SessionManager::new(store.clone(), codec.clone(), &config.auth);

        Self {
            config,
            start_time: Instant::now(),
            store,
            codec,
            sessions,
        }
    }

    /// Replace the Argon2 parameters used at registration
    pub fn with_password_config(mut self, password_config: PasswordConfig) -> Self {
        self.sessions = self.sessions.with_password_config(password_config);
        self
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
