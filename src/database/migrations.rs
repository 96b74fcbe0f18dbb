//! Database migrations for pypi-index
//!
//! This module contains SQL migrations for the SQLite database schema.

/// Connection-level settings applied before the schema
pub const PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
"#;

/// SQL statement to create the initial database schema
pub const CREATE_SCHEMA: &str = r#"
-- Accounts allowed to register and upload
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL DEFAULT '',
    password_hash TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_nocase ON users(username COLLATE NOCASE);

-- Trove classifiers
CREATE TABLE IF NOT EXISTS classifiers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Projects
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    normalized_name TEXT NOT NULL UNIQUE,
    license TEXT NOT NULL DEFAULT '',
    metadata_version TEXT NOT NULL DEFAULT '1.0',
    author TEXT NOT NULL DEFAULT '',
    home_page TEXT,
    download_url TEXT,
    summary TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    author_email TEXT NOT NULL DEFAULT '',
    owner_id INTEGER NOT NULL REFERENCES users(id),
    updated DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);

-- Project <-> classifier links
CREATE TABLE IF NOT EXISTS project_classifiers (
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    classifier_id INTEGER NOT NULL REFERENCES classifiers(id) ON DELETE CASCADE,
    PRIMARY KEY (project_id, classifier_id)
);

-- Release files
CREATE TABLE IF NOT EXISTS releases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    version TEXT NOT NULL,
    filename TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    md5_digest TEXT NOT NULL DEFAULT '',
    sha256_digest TEXT NOT NULL DEFAULT '',
    platform TEXT NOT NULL DEFAULT '',
    signature TEXT NOT NULL DEFAULT '',
    filetype TEXT NOT NULL DEFAULT '',
    pyversion TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    upload_time DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(project_id, version, filename)
);

CREATE INDEX IF NOT EXISTS idx_releases_project ON releases(project_id);
CREATE INDEX IF NOT EXISTS idx_releases_filename ON releases(project_id, filename);
"#;

/// Get the migration version
pub fn migration_version() -> i32 {
    1
}
