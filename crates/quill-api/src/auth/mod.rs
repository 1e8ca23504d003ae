//! Authentication and authorization module
//!
//! - Password hashing with Argon2id
//! - HS256 access and refresh tokens
//! - Refresh token cookie handling
//! - Session lifecycle (register, login, refresh, logout)
//! - The authorization gate and its request extractor

pub mod cookie;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod session;

pub use cookie::{clear_refresh_cookie, read_cookie, refresh_cookie, REFRESH_COOKIE};
pub use gate::{authenticate, authorize, refresh_identity, AuthError, AuthenticatedUser, Identity};
pub use jwt::{Claims, JwtError, TokenCodec};
pub use password::{hash_password, hash_password_with_config, verify_password, PasswordConfig};
pub use session::{LoginTokens, SessionManager};
