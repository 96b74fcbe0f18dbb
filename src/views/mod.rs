//! Server-rendered pages
//!
//! This module provides:
//! - HTML for the project index, project links and version pages
//! - The embedded stylesheet (via rust-embed)

pub mod pages;

pub use pages::{render_index, render_links, render_version};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Embedded static files from the static directory
#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;

/// Get a static file from the embedded assets
pub fn get_static_file(path: &str) -> Option<StaticFile> {
    let path = path.trim_start_matches('/');

    Assets::get(path).map(|content| StaticFile {
        content: content.data.into_owned(),
        mime_type: mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    })
}

/// A static file with content and MIME type
pub struct StaticFile {
    pub content: Vec<u8>,
    pub mime_type: String,
}

impl IntoResponse for StaticFile {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.mime_type),
                (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
            ],
            self.content,
        )
            .into_response()
    }
}

/// Serve an embedded asset or 404
pub fn serve_static(path: &str) -> Response {
    match get_static_file(path) {
        Some(file) => file.into_response(),
        None => (StatusCode::NOT_FOUND, format!("File not found: {}", path)).into_response(),
    }
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}
