//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::{CREATE_SCHEMA, PRAGMAS};
use super::Database;
use crate::error::DbError;
use crate::models::{normalize_name, Project, Release, User};

const PROJECT_COLUMNS: &str = "id, name, license, metadata_version, author, home_page, \
     download_url, summary, description, author_email, owner_id, updated";

const RELEASE_COLUMNS: &str = "r.id, r.project_id, p.name, r.version, r.filename, r.path, \
     r.size, r.md5_digest, r.sha256_digest, r.platform, r.signature, r.filetype, r.pyversion, \
     r.comment, r.upload_time";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: &User) -> Result<i64, DbError> {
        let username = user.username.clone();
        let email = user.email.clone();
        let password_hash = user.password_hash.clone();
        let is_active = user.is_active;
        let created_at = user.created_at.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO users (username, email, password_hash, is_active, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    rusqlite::params![username, email, password_hash, is_active, created_at],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, username, email, password_hash, is_active, created_at
                    FROM users
                    WHERE username = ?1
                    "#,
                )?;

                let result = stmt
                    .query_row([&username], |row| {
                        Ok(User {
                            id: Some(row.get(0)?),
                            username: row.get(1)?,
                            email: row.get(2)?,
                            password_hash: row.get(3)?,
                            is_active: row.get(4)?,
                            created_at: parse_datetime(row.get::<_, Option<String>>(5)?),
                        })
                    })
                    .optional()?;

                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn username_taken(&self, username: &str) -> Result<bool, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE username = ?1 COLLATE NOCASE",
                    [&username],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Project operations
    // =========================================================================

    async fn get_project(&self, name: &str) -> Result<Option<Project>, DbError> {
        let normalized = normalize_name(name);

        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM projects WHERE normalized_name = ?1",
                    PROJECT_COLUMNS
                );
                let project = conn
                    .query_row(&sql, [&normalized], row_to_project)
                    .optional()?;

                match project {
                    Some(mut project) => {
                        if let Some(id) = project.id {
                            project.classifiers = load_classifiers(conn, id)?;
                        }
                        Ok(Some(project))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(Into::into)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
        self.conn
            .call(|conn| {
                let sql = format!("SELECT {} FROM projects ORDER BY name", PROJECT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;

                let projects = stmt
                    .query_map([], row_to_project)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(projects)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_project(&self, project: &Project) -> Result<i64, DbError> {
        let project = project.clone();
        let normalized = project.normalized_name();
        let updated = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO projects
                    (name, normalized_name, license, metadata_version, author, home_page,
                     download_url, summary, description, author_email, owner_id, updated)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                    "#,
                    rusqlite::params![
                        project.name,
                        normalized,
                        project.license,
                        project.metadata_version,
                        project.author,
                        project.home_page,
                        project.download_url,
                        project.summary,
                        project.description,
                        project.author_email,
                        project.owner_id,
                        updated
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    async fn update_project(&self, project: &Project) -> Result<(), DbError> {
        let id = project.id.ok_or(DbError::NotFound)?;
        let project = project.clone();
        let normalized = project.normalized_name();
        let updated = Utc::now().to_rfc3339();

        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"
                    UPDATE projects
                    SET name = ?1, normalized_name = ?2, license = ?3, metadata_version = ?4,
                        author = ?5, home_page = ?6, download_url = ?7, summary = ?8,
                        description = ?9, author_email = ?10, owner_id = ?11, updated = ?12
                    WHERE id = ?13
                    "#,
                    rusqlite::params![
                        project.name,
                        normalized,
                        project.license,
                        project.metadata_version,
                        project.author,
                        project.home_page,
                        project.download_url,
                        project.summary,
                        project.description,
                        project.author_email,
                        project.owner_id,
                        updated,
                        id
                    ],
                )?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }

    async fn add_classifiers(
        &self,
        project_id: i64,
        classifiers: &[String],
    ) -> Result<(), DbError> {
        if classifiers.is_empty() {
            return Ok(());
        }

        let classifiers = classifiers.to_vec();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut insert_classifier =
                        tx.prepare("INSERT OR IGNORE INTO classifiers (name) VALUES (?1)")?;
                    let mut link = tx.prepare(
                        r#"
                        INSERT OR IGNORE INTO project_classifiers (project_id, classifier_id)
                        SELECT ?1, id FROM classifiers WHERE name = ?2
                        "#,
                    )?;

                    for name in &classifiers {
                        insert_classifier.execute([name])?;
                        link.execute(rusqlite::params![project_id, name])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Release operations
    // =========================================================================

    async fn get_release(
        &self,
        project_id: i64,
        version: &str,
        filename: &str,
    ) -> Result<Option<Release>, DbError> {
        let version = version.to_string();
        let filename = filename.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!(
                    r#"
                    SELECT {}
                    FROM releases r JOIN projects p ON p.id = r.project_id
                    WHERE r.project_id = ?1 AND r.version = ?2 AND r.filename = ?3
                    "#,
                    RELEASE_COLUMNS
                );
                let result = conn
                    .query_row(
                        &sql,
                        rusqlite::params![project_id, version, filename],
                        row_to_release,
                    )
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_release_by_filename(
        &self,
        project_id: i64,
        filename: &str,
    ) -> Result<Option<Release>, DbError> {
        let filename = filename.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!(
                    r#"
                    SELECT {}
                    FROM releases r JOIN projects p ON p.id = r.project_id
                    WHERE r.project_id = ?1 AND r.filename = ?2
                    ORDER BY r.id DESC
                    LIMIT 1
                    "#,
                    RELEASE_COLUMNS
                );
                let result = conn
                    .query_row(&sql, rusqlite::params![project_id, filename], row_to_release)
                    .optional()?;
                Ok(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_releases(&self, project_id: i64) -> Result<Vec<Release>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    r#"
                    SELECT {}
                    FROM releases r JOIN projects p ON p.id = r.project_id
                    WHERE r.project_id = ?1
                    ORDER BY r.version, r.filename
                    "#,
                    RELEASE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;

                let releases = stmt
                    .query_map([project_id], row_to_release)?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(releases)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_release(&self, release: &Release) -> Result<i64, DbError> {
        let release = release.clone();
        let upload_time = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO releases
                    (project_id, version, filename, path, size, md5_digest, sha256_digest,
                     platform, signature, filetype, pyversion, comment, upload_time)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    rusqlite::params![
                        release.project_id,
                        release.version,
                        release.filename,
                        release.path,
                        release.size as i64,
                        release.md5_digest,
                        release.sha256_digest,
                        release.platform,
                        release.signature,
                        release.filetype,
                        release.pyversion,
                        release.comment,
                        upload_time
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Into::into)
    }

    async fn update_release(&self, release: &Release) -> Result<(), DbError> {
        let id = release.id.ok_or(DbError::NotFound)?;
        let release = release.clone();
        let upload_time = Utc::now().to_rfc3339();

        let rows_affected = self
            .conn
            .call(move |conn| {
                let count = conn.execute(
                    r#"
                    UPDATE releases
                    SET version = ?1, filename = ?2, path = ?3, size = ?4, md5_digest = ?5,
                        sha256_digest = ?6, platform = ?7, signature = ?8, filetype = ?9,
                        pyversion = ?10, comment = ?11, upload_time = ?12
                    WHERE id = ?13
                    "#,
                    rusqlite::params![
                        release.version,
                        release.filename,
                        release.path,
                        release.size as i64,
                        release.md5_digest,
                        release.sha256_digest,
                        release.platform,
                        release.signature,
                        release.filetype,
                        release.pyversion,
                        release.comment,
                        upload_time,
                        id
                    ],
                )?;
                Ok(count)
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        license: row.get(2)?,
        metadata_version: row.get(3)?,
        author: row.get(4)?,
        home_page: row.get(5)?,
        download_url: row.get(6)?,
        summary: row.get(7)?,
        description: row.get(8)?,
        author_email: row.get(9)?,
        owner_id: row.get(10)?,
        classifiers: Vec::new(),
        updated: parse_datetime(row.get::<_, Option<String>>(11)?),
    })
}

fn row_to_release(row: &rusqlite::Row<'_>) -> rusqlite::Result<Release> {
    Ok(Release {
        id: Some(row.get(0)?),
        project_id: row.get(1)?,
        project_name: row.get(2)?,
        version: row.get(3)?,
        filename: row.get(4)?,
        path: row.get(5)?,
        size: row.get::<_, i64>(6)?.max(0) as u64,
        md5_digest: row.get(7)?,
        sha256_digest: row.get(8)?,
        platform: row.get(9)?,
        signature: row.get(10)?,
        filetype: row.get(11)?,
        pyversion: row.get(12)?,
        comment: row.get(13)?,
        upload_time: parse_datetime(row.get::<_, Option<String>>(14)?),
    })
}

fn load_classifiers(conn: &rusqlite::Connection, project_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT c.name
        FROM classifiers c JOIN project_classifiers pc ON pc.classifier_id = c.id
        WHERE pc.project_id = ?1
        ORDER BY c.name
        "#,
    )?;

    let names = stmt
        .query_map([project_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(names)
}

/// Parse a datetime string from SQLite
///
/// Rows written by this module use RFC 3339; column defaults use SQLite's
/// `CURRENT_TIMESTAMP` format.
fn parse_datetime(s: Option<String>) -> DateTime<Utc> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .map(|dt| dt.and_utc())
                    .ok()
            })
    })
    .unwrap_or_else(Utc::now)
}
