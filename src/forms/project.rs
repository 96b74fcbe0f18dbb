//! Project metadata form

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::models::{Project, DEFAULT_METADATA_VERSION};

use super::{DistutilsForm, FormErrors};

/// Placeholder distutils sends for metadata the author left unset
const UNKNOWN: &str = "UNKNOWN";

fn project_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("valid project name regex")
    })
}

/// Check that a URL is absolute http(s)
pub(crate) fn is_valid_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Metadata posted by `register` and `upload`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectForm {
    pub name: String,
    pub license: String,
    pub metadata_version: String,
    pub author: String,
    pub home_page: Option<String>,
    pub download_url: Option<String>,
    pub summary: String,
    pub description: String,
    pub author_email: String,
    pub classifiers: Vec<String>,
}

impl ProjectForm {
    /// Read project fields from a request body
    pub fn from_form(form: &DistutilsForm) -> Self {
        let optional_url = |name: &str| {
            form.get(name)
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != UNKNOWN)
                .map(str::to_string)
        };

        Self {
            name: form.get_or_empty("name").trim().to_string(),
            license: form.get_or_empty("license").to_string(),
            metadata_version: form.get_or_empty("metadata_version").trim().to_string(),
            author: form.get_or_empty("author").to_string(),
            home_page: optional_url("home_page"),
            download_url: optional_url("download_url"),
            summary: form.get_or_empty("summary").to_string(),
            description: form.get_or_empty("description").to_string(),
            author_email: form.get_or_empty("author_email").to_string(),
            classifiers: form
                .get_all("classifiers")
                .into_iter()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Validate every field, collecting all errors
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        if errors.check_required("name", &self.name) {
            errors.check_length("name", &self.name, 255);
            if !project_name_pattern().is_match(&self.name) {
                errors.add("name", "Enter a valid project name.");
            }
        }
        errors.check_length("metadata_version", &self.metadata_version, 64);
        errors.check_length("author", &self.author, 128);
        errors.check_length("author_email", &self.author_email, 255);

        for (field, value) in [
            ("home_page", &self.home_page),
            ("download_url", &self.download_url),
        ] {
            if let Some(url) = value {
                if !is_valid_http_url(url) {
                    errors.add(field, "Enter a valid URL.");
                }
            }
        }

        for classifier in &self.classifiers {
            errors.check_length("classifiers", classifier, 255);
        }

        errors.into_result()
    }

    /// Copy the posted metadata onto a project, replacing what was there
    pub fn apply_to(&self, project: &mut Project) {
        project.name = self.name.clone();
        project.license = self.license.clone();
        project.metadata_version = if self.metadata_version.is_empty() {
            DEFAULT_METADATA_VERSION.to_string()
        } else {
            self.metadata_version.clone()
        };
        project.author = self.author.clone();
        project.home_page = self.home_page.clone();
        project.download_url = self.download_url.clone();
        project.summary = self.summary.clone();
        project.description = self.description.clone();
        project.author_email = self.author_email.clone();
    }
}
