//! Security collaborators: OPER password verification and per-session
//! flood control (§6.1, §4.B).

pub mod password;
pub mod rate_limit;

pub use password::{BcryptVerifier, PasswordVerifier};
pub use rate_limit::RateLimitManager;
