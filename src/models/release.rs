//! Release-related domain models
//!
//! A release is one distribution file (sdist, wheel, egg, ...) of a project
//! version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::url_path;

/// A versioned distribution file attached to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Database ID (None if not yet persisted)
    pub id: Option<i64>,

    /// Owning project ID
    pub project_id: i64,

    /// Owning project name (joined on read)
    pub project_name: String,

    /// Version string
    pub version: String,

    /// Distribution file name
    pub filename: String,

    /// Storage-relative path of the file
    pub path: String,

    /// File size in bytes
    pub size: u64,

    /// MD5 digest reported by the client
    pub md5_digest: String,

    /// SHA-256 digest computed on upload
    pub sha256_digest: String,

    /// Target platform
    pub platform: String,

    /// Detached GPG signature
    pub signature: String,

    /// Distribution command (sdist, bdist_wheel, ...)
    pub filetype: String,

    /// Python version the file targets (`source` for sdists)
    pub pyversion: String,

    /// Free-form upload comment
    pub comment: String,

    /// Last time the release row was saved
    pub upload_time: DateTime<Utc>,
}

impl Release {
    /// Create a new release for a project file
    pub fn new(
        project_id: i64,
        project_name: impl Into<String>,
        version: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            project_id,
            project_name: project_name.into(),
            version: version.into(),
            filename: filename.into(),
            path: String::new(),
            size: 0,
            md5_digest: String::new(),
            sha256_digest: String::new(),
            platform: String::new(),
            signature: String::new(),
            filetype: String::new(),
            pyversion: String::new(),
            comment: String::new(),
            upload_time: Utc::now(),
        }
    }

    /// Set the distribution type
    pub fn with_filetype(mut self, filetype: impl Into<String>) -> Self {
        self.filetype = filetype.into();
        self
    }

    /// Set the storage path and file facts
    pub fn with_file(mut self, path: impl Into<String>, size: u64, sha256: impl Into<String>) -> Self {
        self.path = path.into();
        self.size = size;
        self.sha256_digest = sha256.into();
        self
    }

    /// `{project}-{version}`
    pub fn release_name(&self) -> String {
        format!("{}-{}", self.project_name, self.version)
    }

    /// Human label for the distribution type
    pub fn type_label(&self) -> &str {
        dist_type_label(&self.filetype)
    }

    /// Download URL with a hash fragment pip can verify
    pub fn download_url(&self) -> String {
        let base = url_path(&["packages", &self.project_name, &self.filename], false);
        if self.sha256_digest.is_empty() {
            base
        } else {
            format!("{}#sha256={}", base, self.sha256_digest)
        }
    }

    /// URL of the version page
    pub fn absolute_url(&self) -> String {
        url_path(&["simple", &self.project_name, &self.version], true)
    }
}

impl std::fmt::Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.release_name(), self.platform)
    }
}

/// Map a distutils command name to a human label
pub fn dist_type_label(filetype: &str) -> &str {
    match filetype {
        "sdist" => "Source",
        "bdist_dumb" => "\"dumb\" binary",
        "bdist_rpm" => "RPM",
        "bdist_wininst" => "MS Windows installer",
        "bdist_egg" => "Python Egg",
        "bdist_dmg" => "OS X Disk Image",
        "bdist_wheel" => "Wheel",
        other => other,
    }
}

/// Compare two version strings segment by segment
///
/// Numeric runs compare numerically and everything else lexically, so
/// `1.10` sorts after `1.9`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = version_segments(a);
    let right = version_segments(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Segment::Number(x), Segment::Number(y)) => x.cmp(y),
            (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
            // A pre-release tag sorts before a numeric segment
            (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
            (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match left.len().cmp(&right.len()) {
        Ordering::Equal => Ordering::Equal,
        // 1.0a1 < 1.0, but 1.0 < 1.0.1
        Ordering::Less => match right.get(left.len()) {
            Some(Segment::Text(_)) => Ordering::Greater,
            _ => Ordering::Less,
        },
        Ordering::Greater => match left.get(right.len()) {
            Some(Segment::Text(_)) => Ordering::Less,
            _ => Ordering::Greater,
        },
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Text(String),
}

fn version_segments(version: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut numeric = false;

    let flush = |current: &mut String, numeric: bool, segments: &mut Vec<Segment>| {
        if current.is_empty() {
            return;
        }
        if numeric {
            match current.parse() {
                Ok(n) => segments.push(Segment::Number(n)),
                Err(_) => segments.push(Segment::Text(current.clone())),
            }
        } else {
            segments.push(Segment::Text(current.to_lowercase()));
        }
        current.clear();
    };

    for c in version.chars() {
        if c.is_ascii_alphanumeric() {
            let is_digit = c.is_ascii_digit();
            if !current.is_empty() && is_digit != numeric {
                flush(&mut current, numeric, &mut segments);
            }
            numeric = is_digit;
            current.push(c);
        } else {
            flush(&mut current, numeric, &mut segments);
        }
    }
    flush(&mut current, numeric, &mut segments);

    segments
}
