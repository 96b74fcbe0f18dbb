//! Application error types for pypi-index
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Authentication-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingAuth,

    /// Authorization header uses a scheme other than Basic
    #[error("Unsupported authentication scheme")]
    UnsupportedScheme,

    /// Basic credentials could not be decoded
    #[error("Malformed credentials")]
    MalformedCredentials,

    /// Unknown user or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated
    #[error("User account is inactive")]
    InactiveUser,

    /// Rate limited due to too many failed attempts
    #[error("Rate limited: too many failed attempts")]
    RateLimited,

    /// Registration with a name that already exists
    #[error("Username already taken")]
    UsernameTaken,

    /// The user store or password hasher failed
    #[error("Authentication backend error: {0}")]
    Backend(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The background connection is gone
    #[error("Connection error: {0}")]
    Connection(String),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => DbError::from(e),
            other => DbError::Connection(other.to_string()),
        }
    }
}

impl DbError {
    /// Returns true if the error is a UNIQUE / FOREIGN KEY violation
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DbError::ConstraintViolation(_) => true,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

/// Distribution storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error while reading or writing a distribution file
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file name cannot be stored safely
    #[error("Invalid file name: {0}")]
    InvalidFilename(String),

    /// No file stored at the given path
    #[error("Stored file not found")]
    NotFound,
}

/// Request body parsing errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Body is neither multipart nor urlencoded
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// Multipart stream was malformed
    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    /// A text field was not valid UTF-8
    #[error("Field {0} is not valid UTF-8")]
    InvalidEncoding(String),

    /// Missing required parameter
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Body exceeded the upload limit
    #[error("Request body too large")]
    PayloadTooLarge,
}

/// Errors produced while handling a distutils action
///
/// Each variant corresponds to one HTTP status; the display string is the
/// response body sent back to the packaging client.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No usable credentials were supplied
    #[error("Authentication required")]
    Unauthorized,

    /// Client IP is temporarily blocked
    #[error("Too many failed attempts. Please try again later.")]
    RateLimited,

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Form validation failed
    #[error("{0}")]
    BadRequest(String),

    /// Unknown project, version or file
    #[error("Not found")]
    NotFound,

    /// Upload larger than the configured limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Unknown `:action`
    #[error("The action {0} is not implemented")]
    NotImplemented(String),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Any other internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for IndexError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth
            | AuthError::UnsupportedScheme
            | AuthError::MalformedCredentials
            | AuthError::InvalidCredentials => IndexError::Unauthorized,
            AuthError::InactiveUser => {
                IndexError::Forbidden("Not logged in, or invalid username/password.".to_string())
            }
            AuthError::RateLimited => IndexError::RateLimited,
            // distutils cannot show a body for a failed registration
            AuthError::UsernameTaken => IndexError::BadRequest(String::new()),
            AuthError::Backend(msg) => IndexError::Internal(msg),
        }
    }
}

impl From<ParseError> for IndexError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::PayloadTooLarge => IndexError::PayloadTooLarge,
            other => IndexError::BadRequest(other.to_string()),
        }
    }
}
