//! Release file form

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::models::Release;
use crate::storage::{sha256_hex, validate_path_component};

use super::{DistutilsForm, FormErrors, UploadedFile};

/// Characters allowed in distribution file names
fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._+!-]+$").expect("valid file name regex"))
}

/// Release fields plus the uploaded distribution
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseForm {
    pub version: String,
    pub filename: String,
    pub md5_digest: String,
    /// Digest the client claims; checked against the file
    pub posted_sha256: Option<String>,
    pub platform: String,
    pub signature: String,
    pub filetype: String,
    pub pyversion: String,
    pub comment: String,
    /// Digest of the received bytes
    pub sha256_digest: String,
    pub size: u64,
}

impl ReleaseForm {
    /// Read release fields and hash the distribution
    pub fn from_form(form: &DistutilsForm, file: &UploadedFile) -> Self {
        Self {
            version: form.get_or_empty("version").trim().to_string(),
            filename: file.filename.clone(),
            md5_digest: form.get_or_empty("md5_digest").trim().to_ascii_lowercase(),
            posted_sha256: form
                .get("sha256_digest")
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty()),
            platform: form.get_or_empty("platform").to_string(),
            signature: form.get_or_empty("signature").to_string(),
            filetype: form.get_or_empty("filetype").to_string(),
            pyversion: form.get_or_empty("pyversion").to_string(),
            comment: form.get_or_empty("comment").to_string(),
            sha256_digest: sha256_hex(&file.data),
            size: file.data.len() as u64,
        }
    }

    /// Validate every field, collecting all errors
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        if errors.check_required("version", &self.version) {
            errors.check_length("version", &self.version, 128);
        }

        if validate_path_component(&self.filename).is_err()
            || !filename_pattern().is_match(&self.filename)
        {
            errors.add("content", "Invalid file name.");
        }

        errors.check_length("md5_digest", &self.md5_digest, 255);
        if !self.md5_digest.is_empty() && !is_hex_digest(&self.md5_digest, 32) {
            errors.add("md5_digest", "Enter a valid MD5 digest.");
        }

        if let Some(posted) = &self.posted_sha256 {
            if *posted != self.sha256_digest {
                errors.add("sha256_digest", "Digest does not match the uploaded file.");
            }
        }

        errors.check_length("platform", &self.platform, 255);
        errors.check_length("signature", &self.signature, 128);
        errors.check_length("filetype", &self.filetype, 255);
        errors.check_length("pyversion", &self.pyversion, 255);

        errors.into_result()
    }

    /// Copy the posted fields onto a release
    ///
    /// The storage path is set by the caller once the file is written.
    pub fn apply_to(&self, release: &mut Release) {
        release.version = self.version.clone();
        release.filename = self.filename.clone();
        release.size = self.size;
        release.md5_digest = self.md5_digest.clone();
        release.sha256_digest = self.sha256_digest.clone();
        release.platform = self.platform.clone();
        release.signature = self.signature.clone();
        release.filetype = self.filetype.clone();
        release.pyversion = self.pyversion.clone();
        release.comment = self.comment.clone();
    }
}

fn is_hex_digest(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_hexdigit())
}
