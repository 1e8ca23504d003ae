//! JWT token encoding and decoding
//!
//! Implements signed, expiring bearer tokens with HMAC-SHA256. Access and
//! refresh tokens share the claim layout `{sub, role?, exp}` and differ only
//! in lifetime.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quill_core::Role;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Claims embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's email
    #[serde(default)]
    pub sub: String,
    /// Role at issue time; informational only, never used for authorization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Expiration timestamp (Unix epoch seconds), stamped by the codec
    #[serde(default)]
    pub exp: u64,
}

impl Claims {
    /// Claims for `subject` with no role and no expiry yet
    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self {
            sub: subject.into(),
            role: None,
            exp: 0,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// Token encoding and decoding errors
///
/// The variants exist for diagnostics only; callers outside the auth core
/// see a single "invalid credentials" answer for all of them.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token has no subject")]
    MissingSubject,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// HS256 token codec bound to one process-wide secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign `claims` with an expiry of `ttl` from now
    ///
    /// # Example
    ///
    /// ```no_run
    /// use quill_api::auth::jwt::{Claims, TokenCodec};
    /// use std::time::Duration;
    ///
    /// let codec = TokenCodec::new("secret");
    /// let token = codec
    ///     .encode(Claims::for_subject("alice@example.com"), Duration::from_secs(1800))
    ///     .expect("Failed to encode token");
    /// let claims = codec.decode(&token).expect("Invalid token");
    /// assert_eq!(claims.sub, "alice@example.com");
    /// ```
    pub fn encode(&self, claims: Claims, ttl: Duration) -> Result<String, JwtError> {
        self.encode_at(claims, ttl, unix_now()?)
    }

    /// Sign `claims` with `exp = now + ttl`
    ///
    /// Refuses to issue a token without a subject.
    pub fn encode_at(&self, mut claims: Claims, ttl: Duration, now: u64) -> Result<String, JwtError> {
        if claims.sub.trim().is_empty() {
            return Err(JwtError::MissingSubject);
        }
        claims.exp = now.saturating_add(ttl.as_secs());

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify a token against the current clock
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        self.decode_at(token, unix_now()?)
    }

    /// Verify a token against the clock reading `now`
    ///
    /// Checks run in a fixed order: signature and structure, then expiry
    /// (rejected once `now > exp`), then a non-empty subject.
    pub fn decode_at(&self, token: &str, now: u64) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::Malformed,
            })?
            .claims;

        if now > claims.exp {
            return Err(JwtError::Expired);
        }
        if claims.sub.trim().is_empty() {
            return Err(JwtError::MissingSubject);
        }

        Ok(claims)
    }
}

fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
