//! The distutils request body
//!
//! Packaging clients post `multipart/form-data` with repeated text fields
//! (e.g. one `classifiers` part per classifier) and the distribution as a
//! file part. `application/x-www-form-urlencoded` bodies carry fields only.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, StatusCode},
};

use crate::error::{IndexError, ParseError};

/// Field carrying the action name
pub const ACTION_FIELD: &str = ":action";

/// File fields that may hold the distribution, in lookup order
const DISTRIBUTION_FIELDS: [&str; 2] = ["content", "distribution"];

/// A file part of a multipart body
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// Client-side file name
    pub filename: String,
    /// Declared content type of the part
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

/// Parsed distutils request: multi-valued text fields plus files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistutilsForm {
    fields: Vec<(String, String)>,
    files: Vec<(String, UploadedFile)>,
}

impl DistutilsForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field value
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Append a file part
    pub fn push_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.push((name.into(), file));
    }

    /// Builder form of [`push_field`](Self::push_field)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_field(name, value);
        self
    }

    /// Builder form of [`push_file`](Self::push_file)
    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.push_file(name, file);
        self
    }

    /// First value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First value of a field, or an empty string
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// Every value of a field, in posted order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// The `:action` value
    pub fn action(&self) -> Option<&str> {
        self.get(ACTION_FIELD)
    }

    /// First file posted under a field name
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, file)| file)
    }

    /// The uploaded distribution, if any
    pub fn distribution(&self) -> Option<&UploadedFile> {
        DISTRIBUTION_FIELDS.iter().find_map(|name| self.file(name))
    }

    /// Whether any file part was posted
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Parse a multipart stream
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ParseError> {
        let mut form = Self::new();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;

            match filename {
                Some(filename) => form.push_file(
                    name,
                    UploadedFile {
                        filename,
                        content_type,
                        data,
                    },
                ),
                None => {
                    let value = String::from_utf8(data.to_vec())
                        .map_err(|_| ParseError::InvalidEncoding(name.clone()))?;
                    form.push_field(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Parse an urlencoded body
    pub fn from_urlencoded(body: &[u8]) -> Self {
        let mut form = Self::new();
        for (name, value) in url::form_urlencoded::parse(body) {
            form.push_field(name, value);
        }
        form
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ParseError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ParseError::PayloadTooLarge
    } else {
        ParseError::Multipart(err.body_text())
    }
}

#[async_trait]
impl<S> FromRequest<S> for DistutilsForm
where
    S: Send + Sync,
{
    type Rejection = IndexError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ParseError::Multipart(e.body_text()))?;
            Ok(Self::from_multipart(multipart).await?)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let body = Bytes::from_request(req, state).await.map_err(|e| {
                if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ParseError::PayloadTooLarge
                } else {
                    ParseError::Multipart(e.body_text())
                }
            })?;
            Ok(Self::from_urlencoded(&body))
        } else {
            Err(ParseError::UnsupportedContentType(content_type).into())
        }
    }
}
