//! Authentication manager
//!
//! This module provides the authentication interface for the upload endpoint.
//! It parses HTTP Basic credentials, checks them against the user table and
//! tracks failed attempts per client IP.

use std::net::IpAddr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::database::Database;
use crate::error::AuthError;
use crate::models::User;

use super::password::{hash_password, verify_password};
use super::ratelimit::{RateLimitConfig, RateLimiter};

/// Realm sent in `WWW-Authenticate` challenges
pub const AUTH_REALM: &str = "pypi";

/// Split an `Authorization` header into Basic credentials
///
/// The scheme is matched case-insensitively. The password may contain `:`.
pub fn parse_basic_auth(header: &str) -> Result<(String, String), AuthError> {
    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedCredentials)?;

    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::UnsupportedScheme);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::MalformedCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedCredentials)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::MalformedCredentials)?;

    Ok((username.to_string(), password.to_string()))
}

/// Authentication manager
///
/// Resolves uploaders from Basic credentials and creates accounts.
pub struct AuthManager<D: Database> {
    db: Arc<D>,
    rate_limiter: RateLimiter,
}

impl<D: Database> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, rate_limit: RateLimitConfig) -> Self {
        Self {
            db,
            rate_limiter: RateLimiter::new(rate_limit),
        }
    }

    /// Authenticate the raw `Authorization` header of a request
    pub async fn authenticate_header(
        &self,
        header: Option<&str>,
        ip: Option<IpAddr>,
    ) -> Result<User, AuthError> {
        self.check_rate_limit(ip)?;

        let header = header.ok_or(AuthError::MissingAuth)?;
        let (username, password) = match parse_basic_auth(header) {
            Ok(credentials) => credentials,
            Err(e) => {
                self.record_failure(ip);
                return Err(e);
            }
        };

        self.authenticate(&username, &password, ip).await
    }

    /// Check a username and password
    ///
    /// Wrong credentials count against the client IP. A correct password for
    /// an inactive account yields [`AuthError::InactiveUser`].
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        ip: Option<IpAddr>,
    ) -> Result<User, AuthError> {
        self.check_rate_limit(ip)?;

        let user = self
            .db
            .get_user_by_username(username)
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                tracing::debug!(username = %username, "Rejected credentials");
                self.record_failure(ip);
                return Err(AuthError::InvalidCredentials);
            }
        };

        if let Some(ip) = ip {
            self.rate_limiter.reset(ip);
        }

        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(user)
    }

    /// Create an active account with a hashed password
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(password).map_err(|e| AuthError::Backend(e.to_string()))?;
        let mut user = User::new(username, email, password_hash);

        match self.db.create_user(&user).await {
            Ok(id) => {
                user.id = Some(id);
                tracing::info!(username = %username, "Created user");
                Ok(user)
            }
            Err(e) if e.is_constraint_violation() => Err(AuthError::UsernameTaken),
            Err(e) => Err(AuthError::Backend(e.to_string())),
        }
    }

    /// Check if an IP is rate limited
    pub fn is_rate_limited(&self, ip: IpAddr) -> bool {
        self.rate_limiter.is_blocked(ip)
    }

    /// Forget clients whose failure window and block have both expired
    pub fn cleanup_rate_limits(&self) {
        self.rate_limiter.cleanup();
    }

    /// Number of clients with recorded failures
    pub fn tracked_clients(&self) -> usize {
        self.rate_limiter.tracked_ips_count()
    }

    fn check_rate_limit(&self, ip: Option<IpAddr>) -> Result<(), AuthError> {
        match ip {
            Some(ip) if self.rate_limiter.is_blocked(ip) => Err(AuthError::RateLimited),
            _ => Ok(()),
        }
    }

    fn record_failure(&self, ip: Option<IpAddr>) {
        if let Some(ip) = ip {
            self.rate_limiter.record_failure(ip);
        }
    }
}
