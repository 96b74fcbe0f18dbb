//! Database layer for pypi-index
//!
//! This module defines the database trait and SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{Project, Release, User};

/// Database trait for data persistence
///
/// This trait defines all database operations needed by the application.
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Create a user account
    ///
    /// Returns the ID of the inserted user
    async fn create_user(&self, user: &User) -> Result<i64, DbError>;

    /// Get a user by exact username
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError>;

    /// Check whether a username is taken, ignoring case
    async fn username_taken(&self, username: &str) -> Result<bool, DbError>;

    // =========================================================================
    // Project operations
    // =========================================================================

    /// Get a project by name
    ///
    /// The lookup uses the PEP 503 normalised name. Classifiers are loaded.
    async fn get_project(&self, name: &str) -> Result<Option<Project>, DbError>;

    /// List all projects ordered by name
    async fn list_projects(&self) -> Result<Vec<Project>, DbError>;

    /// Insert a new project
    ///
    /// Returns the ID of the inserted project
    async fn insert_project(&self, project: &Project) -> Result<i64, DbError>;

    /// Overwrite an existing project's metadata and owner
    async fn update_project(&self, project: &Project) -> Result<(), DbError>;

    /// Attach classifiers to a project, creating unknown ones
    ///
    /// Existing links are kept.
    async fn add_classifiers(&self, project_id: i64, classifiers: &[String])
        -> Result<(), DbError>;

    // =========================================================================
    // Release operations
    // =========================================================================

    /// Get the release holding a given file of a version
    async fn get_release(
        &self,
        project_id: i64,
        version: &str,
        filename: &str,
    ) -> Result<Option<Release>, DbError>;

    /// Get a release by its file name within a project
    async fn get_release_by_filename(
        &self,
        project_id: i64,
        filename: &str,
    ) -> Result<Option<Release>, DbError>;

    /// List every release file of a project
    async fn list_releases(&self, project_id: i64) -> Result<Vec<Release>, DbError>;

    /// Insert a release
    ///
    /// Returns the ID of the inserted release
    async fn insert_release(&self, release: &Release) -> Result<i64, DbError>;

    /// Update an existing release
    async fn update_release(&self, release: &Release) -> Result<(), DbError>;
}
