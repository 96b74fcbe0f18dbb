//! Account registration form

use std::sync::OnceLock;

use regex_lite::Regex;

use super::{DistutilsForm, FormErrors};

const MAX_USERNAME_LENGTH: usize = 150;

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.@+-]+$").expect("valid username regex"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
    })
}

/// Fields posted by the `user` action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn from_form(form: &DistutilsForm) -> Self {
        Self {
            username: form.get_or_empty("name").trim().to_string(),
            email: form.get_or_empty("email").trim().to_string(),
            password: form.get_or_empty("password").to_string(),
        }
    }

    /// Validate the fields; uniqueness is checked against the database separately
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        if errors.check_required("username", &self.username) {
            errors.check_length("username", &self.username, MAX_USERNAME_LENGTH);
            if !username_pattern().is_match(&self.username) {
                errors.add(
                    "username",
                    "This value may contain only letters, numbers and @/./+/-/_ characters.",
                );
            }
        }

        if errors.check_required("email", &self.email) && !email_pattern().is_match(&self.email) {
            errors.add("email", "Enter a valid email address.");
        }

        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        }

        errors.into_result()
    }
}
