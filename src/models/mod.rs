//! Domain models for pypi-index
//!
//! This module contains the core domain models used throughout the application.

pub mod project;
pub mod release;
pub mod user;

// Re-export commonly used types
pub use project::{normalize_name, Classifier, Project, DEFAULT_METADATA_VERSION};
pub use release::{compare_versions, dist_type_label, Release};
pub use user::User;

/// Build an absolute URL path from raw segments, percent-encoding each one
///
/// `trailing_slash` appends an empty final segment so the path ends in `/`.
pub fn url_path(segments: &[&str], trailing_slash: bool) -> String {
    let mut url = match url::Url::parse("http://localhost/") {
        Ok(url) => url,
        Err(_) => return "/".to_string(),
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
        if trailing_slash {
            path.push("");
        }
    }
    url.path().to_string()
}
