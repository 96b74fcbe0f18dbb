//! Project-related domain models
//!
//! This module defines projects, their Trove classifiers, and PEP 503 name
//! normalisation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::url_path;

/// Default metadata version for projects registered without one
pub const DEFAULT_METADATA_VERSION: &str = "1.0";

/// A Trove classifier (e.g. `Programming Language :: Python :: 3`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    /// Database ID (None if not yet persisted)
    pub id: Option<i64>,

    /// Classifier string, unique across the index
    pub name: String,
}

impl Classifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named package owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Database ID (None if not yet persisted)
    pub id: Option<i64>,

    /// Project name as registered
    pub name: String,

    /// License text
    pub license: String,

    /// Core metadata version reported by the client
    pub metadata_version: String,

    /// Author name
    pub author: String,

    /// Home page URL
    pub home_page: Option<String>,

    /// Download URL
    pub download_url: Option<String>,

    /// One-line summary
    pub summary: String,

    /// Long description
    pub description: String,

    /// Author e-mail address
    pub author_email: String,

    /// ID of the owning user
    pub owner_id: i64,

    /// Attached classifier names, sorted
    pub classifiers: Vec<String>,

    /// Last time the project row was saved
    pub updated: DateTime<Utc>,
}

impl Project {
    /// Create a new project with empty metadata
    pub fn new(name: impl Into<String>, owner_id: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            license: String::new(),
            metadata_version: DEFAULT_METADATA_VERSION.to_string(),
            author: String::new(),
            home_page: None,
            download_url: None,
            summary: String::new(),
            description: String::new(),
            author_email: String::new(),
            owner_id,
            classifiers: Vec::new(),
            updated: Utc::now(),
        }
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the home page
    pub fn with_home_page(mut self, url: impl Into<String>) -> Self {
        self.home_page = Some(url.into());
        self
    }

    /// PEP 503 normalised name used for lookups
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether the given user owns this project
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }

    /// URL of the simple links page
    pub fn absolute_url(&self) -> String {
        url_path(&["simple", &self.name], true)
    }

    /// URL of the links page under the `/pypi` alias
    pub fn pypi_absolute_url(&self) -> String {
        url_path(&["pypi", &self.name], true)
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Normalise a project name according to PEP 503
///
/// Lower-cases the name and collapses every run of `-`, `_` and `.` into a
/// single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                normalized.push('-');
                in_separator = true;
            }
        } else {
            normalized.extend(c.to_lowercase());
            in_separator = false;
        }
    }

    normalized
}
