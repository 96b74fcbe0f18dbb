//! Request forms for the distutils endpoint
//!
//! [`DistutilsForm`] holds the raw posted fields and files. The validating
//! forms read from it and report problems as [`FormErrors`].

pub mod distutils;
pub mod errors;
pub mod project;
pub mod registration;
pub mod release;

pub use distutils::{DistutilsForm, UploadedFile, ACTION_FIELD};
pub use errors::FormErrors;
pub use project::ProjectForm;
pub use registration::RegistrationForm;
pub use release::ReleaseForm;
