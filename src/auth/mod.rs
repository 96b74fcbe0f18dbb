//! Authentication system for pypi-index
//!
//! This module provides authentication for the upload endpoint:
//! - Password hashing
//! - Basic authentication
//! - Rate limiting for failed attempts

pub mod manager;
pub mod password;
pub mod ratelimit;

pub use manager::{parse_basic_auth, AuthManager, AUTH_REALM};
pub use password::{hash_password, verify_password, HashError};
pub use ratelimit::{RateLimitConfig, RateLimiter};
