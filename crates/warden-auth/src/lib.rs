//! Warden Auth: password hashing, session and reset tokens, RBAC
//! evaluation and administration.

pub mod admin;
pub mod config;
pub mod error;
pub mod password;
pub mod rbac;
pub mod reset;
pub mod service;
pub mod session;
pub mod token;

pub use admin::RbacAdmin;
pub use config::AuthConfig;
pub use error::AuthError;
pub use password::{Argon2Hasher, PasswordHasher};
pub use service::{AuthService, LoginOutput, NewUser};
pub use session::{IssuedToken, SessionTokens};
pub use token::SessionClaims;
