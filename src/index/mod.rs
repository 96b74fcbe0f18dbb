//! Package index service
//!
//! Implements the distutils `:action` protocol on top of the database and
//! distribution store, plus the queries behind the listing pages.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::auth::AuthManager;
use crate::config::IndexConfig;
use crate::database::Database;
use crate::error::IndexError;
use crate::forms::{DistutilsForm, FormErrors, ProjectForm, RegistrationForm, ReleaseForm};
use crate::models::{compare_versions, Project, Release, User};
use crate::storage::DistributionStore;

/// Behaviour switches for the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    /// Allow re-uploading a file that already exists for a version
    pub allow_version_overwrite: bool,
    /// Accept the `user` action
    pub registration_open: bool,
    /// Title of the project list page
    pub title: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for IndexSettings {
    fn from(config: &IndexConfig) -> Self {
        Self {
            allow_version_overwrite: config.allow_version_overwrite,
            registration_open: config.registration_open,
            title: config.title.clone(),
        }
    }
}

/// Supported `:action` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `upload` command
    FileUpload,
    /// `register` command
    Submit,
    /// Account creation
    User,
}

impl FromStr for Action {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file_upload" => Ok(Action::FileUpload),
            "submit" => Ok(Action::Submit),
            "user" => Ok(Action::User),
            other => Err(IndexError::NotImplemented(other.to_string())),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::FileUpload => write!(f, "file_upload"),
            Action::Submit => write!(f, "submit"),
            Action::User => write!(f, "user"),
        }
    }
}

/// Successful result of an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Project registered or file stored (`200`, empty body)
    Accepted,
    /// Account created (`200`, `OK\n`)
    UserCreated,
}

/// Credentials and origin of a POST
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    /// Raw `Authorization` header
    pub authorization: Option<&'a str>,
    /// Client address, when known
    pub client_ip: Option<IpAddr>,
}

/// Projects, releases and users behind the HTTP endpoints
pub struct PackageIndex<D: Database> {
    db: Arc<D>,
    store: Arc<dyn DistributionStore>,
    auth: Arc<AuthManager<D>>,
    settings: IndexSettings,
}

impl<D: Database> PackageIndex<D> {
    pub fn new(
        db: Arc<D>,
        store: Arc<dyn DistributionStore>,
        auth: Arc<AuthManager<D>>,
        settings: IndexSettings,
    ) -> Self {
        Self {
            db,
            store,
            auth,
            settings,
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn auth(&self) -> &Arc<AuthManager<D>> {
        &self.auth
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Run the `:action` named in the form
    pub async fn dispatch(
        &self,
        form: &DistutilsForm,
        ctx: RequestContext<'_>,
    ) -> Result<ActionOutcome, IndexError> {
        let action: Action = match form.action() {
            Some(name) => name.parse()?,
            None => return Err(IndexError::NotImplemented("(missing)".to_string())),
        };

        tracing::debug!(action = %action, "Dispatching distutils action");

        match action {
            Action::FileUpload | Action::Submit => {
                let user = self
                    .auth
                    .authenticate_header(ctx.authorization, ctx.client_ip)
                    .await?;
                self.register_or_upload(&user, form).await
            }
            Action::User => self.create_user(form).await,
        }
    }

    /// Register project metadata and store an uploaded file, if any
    pub async fn register_or_upload(
        &self,
        user: &User,
        form: &DistutilsForm,
    ) -> Result<ActionOutcome, IndexError> {
        let user_id = user
            .id
            .ok_or_else(|| IndexError::Internal("user has no id".to_string()))?;

        let existing = match form.get("name").map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self.db.get_project(name).await?,
            None => None,
        };

        if let Some(project) = &existing {
            if !project.is_owned_by(user_id) {
                tracing::info!(
                    project = %project.name,
                    user = %user.username,
                    "Rejected change to project owned by another user"
                );
                return Err(IndexError::Forbidden(
                    "That project is owned by someone else!".to_string(),
                ));
            }
        }

        let project_form = ProjectForm::from_form(form);
        project_form.validate()?;

        let project = self.save_project(existing, &project_form, user_id).await?;

        if form.has_files() {
            let file = form.distribution().ok_or_else(|| {
                let mut errors = FormErrors::new();
                errors.add("content", "This field is required.");
                IndexError::from(errors)
            })?;
            let release_form = ReleaseForm::from_form(form, file);
            self.save_release(&project, &release_form, file.data.clone())
                .await?;
        }

        Ok(ActionOutcome::Accepted)
    }

    async fn save_project(
        &self,
        existing: Option<Project>,
        project_form: &ProjectForm,
        owner_id: i64,
    ) -> Result<Project, IndexError> {
        let mut project = existing.unwrap_or_else(|| Project::new(&project_form.name, owner_id));
        project_form.apply_to(&mut project);
        project.owner_id = owner_id;

        match project.id {
            Some(_) => self.db.update_project(&project).await?,
            None => {
                let id = self.db.insert_project(&project).await?;
                project.id = Some(id);
                tracing::info!(project = %project.name, "Registered project");
            }
        }

        if let Some(id) = project.id {
            self.db
                .add_classifiers(id, &project_form.classifiers)
                .await?;
        }

        Ok(project)
    }

    async fn save_release(
        &self,
        project: &Project,
        release_form: &ReleaseForm,
        data: Bytes,
    ) -> Result<(), IndexError> {
        let project_id = project
            .id
            .ok_or_else(|| IndexError::Internal("project has no id".to_string()))?;

        // A file name maps to one stored file, whatever version claims it
        if let Some(other) = self
            .db
            .get_release_by_filename(project_id, &release_form.filename)
            .await?
        {
            if other.version != release_form.version {
                return Err(already_exists(&other));
            }
        }

        let existing = self
            .db
            .get_release(project_id, &release_form.version, &release_form.filename)
            .await?;

        if let Some(release) = &existing {
            if !self.settings.allow_version_overwrite {
                return Err(already_exists(release));
            }
        }

        release_form.validate()?;

        match existing {
            Some(mut release) => {
                // Replaced in place; the old file stays until the write succeeds
                let stored = self
                    .store
                    .save(&project.name, &release_form.filename, data)
                    .await?;

                let previous = std::mem::replace(&mut release.path, stored.path);
                release_form.apply_to(&mut release);
                self.db.update_release(&release).await?;

                if !previous.is_empty() && previous != release.path {
                    if let Err(e) = self.store.delete(&previous).await {
                        tracing::warn!(
                            path = %previous,
                            error = %e,
                            "Failed to remove replaced file"
                        );
                    }
                }

                tracing::info!(
                    project = %project.name,
                    version = %release.version,
                    filename = %release.filename,
                    "Replaced release file"
                );
            }
            None => {
                let stored = self
                    .store
                    .save(&project.name, &release_form.filename, data)
                    .await?;

                let mut release = Release::new(
                    project_id,
                    &project.name,
                    &release_form.version,
                    &release_form.filename,
                );
                release_form.apply_to(&mut release);
                release.path = stored.path.clone();

                if let Err(e) = self.db.insert_release(&release).await {
                    if let Err(cleanup) = self.store.delete(&stored.path).await {
                        tracing::warn!(error = %cleanup, path = %stored.path, "Failed to remove orphaned file");
                    }
                    return Err(e.into());
                }

                tracing::info!(
                    project = %project.name,
                    version = %release.version,
                    filename = %release.filename,
                    size = release.size,
                    "Stored release file"
                );
            }
        }

        Ok(())
    }

    /// Create an account from the `user` action
    ///
    /// Every rejection is a bare `400`; distutils cannot display a body.
    pub async fn create_user(&self, form: &DistutilsForm) -> Result<ActionOutcome, IndexError> {
        let registration = RegistrationForm::from_form(form);

        if let Err(errors) = registration.validate() {
            tracing::debug!(errors = %errors, "Rejected registration");
            return Err(IndexError::BadRequest(String::new()));
        }

        if !self.settings.registration_open {
            return Err(IndexError::BadRequest(String::new()));
        }

        if self.db.username_taken(&registration.username).await? {
            return Err(IndexError::BadRequest(String::new()));
        }

        self.auth
            .register_user(
                &registration.username,
                &registration.email,
                &registration.password,
            )
            .await?;

        Ok(ActionOutcome::UserCreated)
    }

    // =========================================================================
    // Listing queries
    // =========================================================================

    /// All projects ordered by name
    pub async fn list_projects(&self) -> Result<Vec<Project>, IndexError> {
        Ok(self.db.list_projects().await?)
    }

    /// A project and its release files, newest version first
    pub async fn project_releases(
        &self,
        name: &str,
    ) -> Result<(Project, Vec<Release>), IndexError> {
        let project = self
            .db
            .get_project(name)
            .await?
            .ok_or(IndexError::NotFound)?;
        let project_id = project.id.ok_or(IndexError::NotFound)?;

        let mut releases = self.db.list_releases(project_id).await?;
        releases.sort_by(|a, b| {
            compare_versions(&b.version, &a.version).then_with(|| a.filename.cmp(&b.filename))
        });

        Ok((project, releases))
    }

    /// A project and the files of one version
    pub async fn version_releases(
        &self,
        name: &str,
        version: &str,
    ) -> Result<(Project, Vec<Release>), IndexError> {
        let (project, releases) = self.project_releases(name).await?;
        let releases: Vec<Release> = releases
            .into_iter()
            .filter(|r| r.version == version)
            .collect();

        if releases.is_empty() {
            return Err(IndexError::NotFound);
        }
        Ok((project, releases))
    }

    /// A stored distribution file and its release row
    pub async fn download(
        &self,
        project: &str,
        filename: &str,
    ) -> Result<(Release, Bytes), IndexError> {
        let project = self
            .db
            .get_project(project)
            .await?
            .ok_or(IndexError::NotFound)?;
        let project_id = project.id.ok_or(IndexError::NotFound)?;

        let release = self
            .db
            .get_release_by_filename(project_id, filename)
            .await?
            .ok_or(IndexError::NotFound)?;

        let data = self
            .store
            .read(&release.path)
            .await?
            .ok_or(IndexError::NotFound)?;

        Ok((release, data))
    }
}

fn already_exists(release: &Release) -> IndexError {
    IndexError::Forbidden(format!(
        "A file named \"{}\" already exists for {}. To fix problems with that you should create a new release.",
        release.filename, release
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RateLimitConfig;
    use crate::database::{MockDatabase, SqliteDatabase};
    use crate::error::{DbError, StorageError};
    use crate::forms::UploadedFile;
    use crate::storage::{sha256_hex, FilesystemStore, StoredFile};
    use base64::{engine::general_purpose::STANDARD, Engine};
    use tempfile::TempDir;

    struct Fixture {
        index: PackageIndex<SqliteDatabase>,
        db: Arc<SqliteDatabase>,
        temp: TempDir,
    }

    async fn fixture(settings: IndexSettings) -> Fixture {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(SqliteDatabase::in_memory().await.unwrap());
        let store: Arc<dyn DistributionStore> =
            Arc::new(FilesystemStore::new_with_init(temp.path()).await.unwrap());
        let auth = Arc::new(AuthManager::new(db.clone(), RateLimitConfig::default()));

        auth.register_user("alice", "alice@example.com", "secret")
            .await
            .unwrap();
        auth.register_user("bob", "bob@example.com", "hunter2")
            .await
            .unwrap();

        Fixture {
            index: PackageIndex::new(db.clone(), store, auth, settings),
            db,
            temp,
        }
    }

    fn basic(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
    }

    fn ctx(header: &str) -> RequestContext<'_> {
        RequestContext {
            authorization: Some(header),
            client_ip: None,
        }
    }

    fn upload(name: &str, version: &str, filename: &str, data: &'static str) -> DistutilsForm {
        DistutilsForm::new()
            .with_field(":action", "file_upload")
            .with_field("name", name)
            .with_field("version", version)
            .with_field("filetype", "sdist")
            .with_file(
                "content",
                UploadedFile {
                    filename: filename.to_string(),
                    content_type: None,
                    data: Bytes::from(data),
                },
            )
    }

    // Test 1: Action names
    #[test]
    fn test_action_parse() {
        assert_eq!("file_upload".parse::<Action>().unwrap(), Action::FileUpload);
        assert_eq!("submit".parse::<Action>().unwrap(), Action::Submit);
        assert_eq!("user".parse::<Action>().unwrap(), Action::User);
        assert_eq!(Action::Submit.to_string(), "submit");

        let err = "doap".parse::<Action>().unwrap_err();
        assert_eq!(err.to_string(), "The action doap is not implemented");
    }

    // Test 2: Unknown and missing actions
    #[tokio::test]
    async fn test_dispatch_not_implemented() {
        let f = fixture(IndexSettings::default()).await;

        let form = DistutilsForm::new().with_field(":action", "list_classifiers");
        let err = f.index.dispatch(&form, RequestContext::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::NotImplemented(ref a) if a == "list_classifiers"));

        let err = f
            .index
            .dispatch(&DistutilsForm::new(), RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::NotImplemented(_)));
    }

    // Test 3: Upload requires credentials
    #[tokio::test]
    async fn test_upload_requires_auth() {
        let f = fixture(IndexSettings::default()).await;
        let form = upload("pkg", "1.0", "pkg-1.0.tar.gz", "data");

        let err = f.index.dispatch(&form, RequestContext::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::Unauthorized));

        let header = basic("alice", "wrong");
        let err = f.index.dispatch(&form, ctx(&header)).await.unwrap_err();
        assert!(matches!(err, IndexError::Unauthorized));
    }

    // Test 4: Submit registers a project and accumulates classifiers
    #[tokio::test]
    async fn test_submit_registers_project() {
        let f = fixture(IndexSettings::default()).await;
        let header = basic("alice", "secret");

        let form = DistutilsForm::new()
            .with_field(":action", "submit")
            .with_field("name", "My_Pkg")
            .with_field("summary", "First")
            .with_field("classifiers", "Topic :: Utilities");
        let outcome = f.index.dispatch(&form, ctx(&header)).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Accepted);

        let form = DistutilsForm::new()
            .with_field(":action", "submit")
            .with_field("name", "my-pkg")
            .with_field("summary", "Second")
            .with_field("classifiers", "License :: OSI Approved");
        f.index.dispatch(&form, ctx(&header)).await.unwrap();

        let project = f.db.get_project("my_pkg").await.unwrap().unwrap();
        assert_eq!(project.name, "my-pkg");
        assert_eq!(project.summary, "Second");
        assert_eq!(
            project.classifiers,
            vec!["License :: OSI Approved", "Topic :: Utilities"]
        );
        assert_eq!(f.db.list_projects().await.unwrap().len(), 1);
        assert!(f
            .db
            .list_releases(project.id.unwrap())
            .await
            .unwrap()
            .is_empty());
    }

    // Test 5: Invalid metadata is a 400 with the field errors
    #[tokio::test]
    async fn test_submit_invalid_metadata() {
        let f = fixture(IndexSettings::default()).await;
        let header = basic("alice", "secret");

        let form = DistutilsForm::new()
            .with_field(":action", "submit")
            .with_field("name", "pkg")
            .with_field("home_page", "nope");
        let err = f.index.dispatch(&form, ctx(&header)).await.unwrap_err();

        match err {
            IndexError::BadRequest(body) => assert_eq!(body, "ERRORS: home_page: Enter a valid URL."),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
        assert!(f.db.get_project("pkg").await.unwrap().is_none());
    }

    // Test 6: Another user's project is off limits
    #[tokio::test]
    async fn test_owner_mismatch_forbidden() {
        let f = fixture(IndexSettings::default()).await;

        let alice = basic("alice", "secret");
        f.index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "a"), ctx(&alice))
            .await
            .unwrap();

        let bob = basic("bob", "hunter2");
        let err = f
            .index
            .dispatch(&upload("PKG", "1.1", "pkg-1.1.tar.gz", "b"), ctx(&bob))
            .await
            .unwrap_err();

        match err {
            IndexError::Forbidden(msg) => assert_eq!(msg, "That project is owned by someone else!"),
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    // Test 7: Upload stores the file and release row
    #[tokio::test]
    async fn test_upload_stores_release() {
        let f = fixture(IndexSettings::default()).await;
        let header = basic("alice", "secret");

        f.index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "sdist"), ctx(&header))
            .await
            .unwrap();

        let (release, data) = f.index.download("pkg", "pkg-1.0.tar.gz").await.unwrap();
        assert_eq!(data, Bytes::from("sdist"));
        assert_eq!(release.version, "1.0");
        assert_eq!(release.filetype, "sdist");
        assert_eq!(release.size, 5);
        assert_eq!(release.sha256_digest, sha256_hex(b"sdist"));
        assert_eq!(release.path, "pkg/pkg-1.0.tar.gz");
    }

    // Test 8: Duplicate file without overwrite
    #[tokio::test]
    async fn test_duplicate_upload_forbidden() {
        let f = fixture(IndexSettings::default()).await;
        let header = basic("alice", "secret");
        let form = upload("pkg", "1.0", "pkg-1.0.tar.gz", "first");

        f.index.dispatch(&form, ctx(&header)).await.unwrap();
        let err = f
            .index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "second"), ctx(&header))
            .await
            .unwrap_err();

        match err {
            IndexError::Forbidden(msg) => assert_eq!(
                msg,
                "A file named \"pkg-1.0.tar.gz\" already exists for pkg-1.0 (). \
                 To fix problems with that you should create a new release."
            ),
            other => panic!("Expected Forbidden, got {:?}", other),
        }

        let (_, data) = f.index.download("pkg", "pkg-1.0.tar.gz").await.unwrap();
        assert_eq!(data, Bytes::from("first"));
    }

    // Test 9: Overwrite replaces the stored file
    #[tokio::test]
    async fn test_overwrite_allowed() {
        let settings = IndexSettings {
            allow_version_overwrite: true,
            ..IndexSettings::default()
        };
        let f = fixture(settings).await;
        let header = basic("alice", "secret");

        f.index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "first"), ctx(&header))
            .await
            .unwrap();
        f.index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "second!"), ctx(&header))
            .await
            .unwrap();

        let (release, data) = f.index.download("pkg", "pkg-1.0.tar.gz").await.unwrap();
        assert_eq!(data, Bytes::from("second!"));
        assert_eq!(release.size, 7);

        let (_, releases) = f.index.project_releases("pkg").await.unwrap();
        assert_eq!(releases.len(), 1);
    }

    // Test 10: A failed overwrite keeps the previous file
    #[tokio::test]
    async fn test_overwrite_failure_keeps_previous_file() {
        struct ReadOnlyStore(FilesystemStore);

        #[async_trait::async_trait]
        impl DistributionStore for ReadOnlyStore {
            fn name(&self) -> &str {
                "read-only"
            }

            async fn save(
                &self,
                _project: &str,
                _filename: &str,
                _data: Bytes,
            ) -> Result<StoredFile, StorageError> {
                Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )))
            }

            async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
                self.0.read(path).await
            }

            async fn delete(&self, path: &str) -> Result<(), StorageError> {
                self.0.delete(path).await
            }
        }

        let settings = IndexSettings {
            allow_version_overwrite: true,
            ..IndexSettings::default()
        };
        let f = fixture(settings.clone()).await;
        let header = basic("alice", "secret");
        f.index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "first"), ctx(&header))
            .await
            .unwrap();

        let store: Arc<dyn DistributionStore> =
            Arc::new(ReadOnlyStore(FilesystemStore::new(f.temp.path())));
        let auth = Arc::new(AuthManager::new(f.db.clone(), RateLimitConfig::default()));
        let index = PackageIndex::new(f.db.clone(), store, auth, settings);

        let err = index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "second!"), ctx(&header))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Storage(_)));

        let (release, data) = index.download("pkg", "pkg-1.0.tar.gz").await.unwrap();
        assert_eq!(data, Bytes::from("first"));
        assert_eq!(release.size, 5);
    }

    // Test 11: Several files per version, newest version first
    #[tokio::test]
    async fn test_project_releases_ordering() {
        let f = fixture(IndexSettings::default()).await;
        let header = basic("alice", "secret");

        for (version, filename) in [
            ("1.9", "pkg-1.9.tar.gz"),
            ("1.10", "pkg-1.10.tar.gz"),
            ("1.10", "pkg-1.10-py3-none-any.whl"),
            ("1.0a1", "pkg-1.0a1.tar.gz"),
        ] {
            f.index
                .dispatch(&upload("pkg", version, filename, "x"), ctx(&header))
                .await
                .unwrap();
        }

        let (_, releases) = f.index.project_releases("pkg").await.unwrap();
        let files: Vec<&str> = releases.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            files,
            vec![
                "pkg-1.10-py3-none-any.whl",
                "pkg-1.10.tar.gz",
                "pkg-1.9.tar.gz",
                "pkg-1.0a1.tar.gz"
            ]
        );

        let (_, files) = f.index.version_releases("pkg", "1.10").await.unwrap();
        assert_eq!(files.len(), 2);

        assert!(matches!(
            f.index.version_releases("pkg", "3.0").await,
            Err(IndexError::NotFound)
        ));
        assert!(matches!(
            f.index.project_releases("missing").await,
            Err(IndexError::NotFound)
        ));
    }

    // Test 12: A file name cannot move to another version
    #[tokio::test]
    async fn test_filename_reused_by_other_version() {
        let settings = IndexSettings {
            allow_version_overwrite: true,
            ..IndexSettings::default()
        };
        let f = fixture(settings).await;
        let header = basic("alice", "secret");

        f.index
            .dispatch(&upload("pkg", "1.0", "pkg.tar.gz", "one"), ctx(&header))
            .await
            .unwrap();
        let err = f
            .index
            .dispatch(&upload("pkg", "2.0", "pkg.tar.gz", "two"), ctx(&header))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Forbidden(_)));
    }

    // Test 13: Release form errors
    #[tokio::test]
    async fn test_upload_invalid_release() {
        let f = fixture(IndexSettings::default()).await;
        let header = basic("alice", "secret");

        let form = upload("pkg", "1.0", "pkg-1.0.tar.gz", "data")
            .with_field("sha256_digest", sha256_hex(b"other"));
        let err = f.index.dispatch(&form, ctx(&header)).await.unwrap_err();
        match err {
            IndexError::BadRequest(body) => assert!(body.starts_with("ERRORS: sha256_digest")),
            other => panic!("Expected BadRequest, got {:?}", other),
        }

        // Files posted under an unknown field name
        let form = DistutilsForm::new()
            .with_field(":action", "file_upload")
            .with_field("name", "pkg")
            .with_file(
                "gpg_signature",
                UploadedFile {
                    filename: "pkg-1.0.tar.gz.asc".to_string(),
                    content_type: None,
                    data: Bytes::from("sig"),
                },
            );
        let err = f.index.dispatch(&form, ctx(&header)).await.unwrap_err();
        assert!(matches!(err, IndexError::BadRequest(ref b) if b == "ERRORS: content: This field is required."));
    }

    // Test 14: Inactive users are forbidden
    #[tokio::test]
    async fn test_inactive_user_forbidden() {
        let f = fixture(IndexSettings::default()).await;
        let hash = crate::auth::hash_password("pw").unwrap();
        f.db.create_user(&User::new("carol", "carol@example.com", hash).deactivated())
            .await
            .unwrap();

        let header = basic("carol", "pw");
        let err = f
            .index
            .dispatch(&upload("pkg", "1.0", "pkg-1.0.tar.gz", "x"), ctx(&header))
            .await
            .unwrap_err();
        assert!(
            matches!(err, IndexError::Forbidden(ref m) if m == "Not logged in, or invalid username/password.")
        );
    }

    // Test 15: User creation
    #[tokio::test]
    async fn test_create_user() {
        let f = fixture(IndexSettings::default()).await;

        let form = DistutilsForm::new()
            .with_field(":action", "user")
            .with_field("name", "dave")
            .with_field("email", "dave@example.com")
            .with_field("password", "pw");
        let outcome = f.index.dispatch(&form, RequestContext::default()).await.unwrap();
        assert_eq!(outcome, ActionOutcome::UserCreated);

        let user = f.db.get_user_by_username("dave").await.unwrap().unwrap();
        assert!(user.is_active);

        // Same name in another case
        let form = DistutilsForm::new()
            .with_field(":action", "user")
            .with_field("name", "DAVE")
            .with_field("email", "dave@example.com")
            .with_field("password", "pw");
        let err = f.index.dispatch(&form, RequestContext::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::BadRequest(ref b) if b.is_empty()));

        let form = DistutilsForm::new()
            .with_field(":action", "user")
            .with_field("name", "erin");
        let err = f.index.dispatch(&form, RequestContext::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::BadRequest(ref b) if b.is_empty()));
    }

    // Test 16: Registration closed
    #[tokio::test]
    async fn test_create_user_registration_closed() {
        let settings = IndexSettings {
            registration_open: false,
            ..IndexSettings::default()
        };
        let f = fixture(settings).await;

        let form = DistutilsForm::new()
            .with_field(":action", "user")
            .with_field("name", "dave")
            .with_field("email", "dave@example.com")
            .with_field("password", "pw");
        let err = f.index.dispatch(&form, RequestContext::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::BadRequest(_)));
        assert!(f.db.get_user_by_username("dave").await.unwrap().is_none());
    }

    // Test 17: Database failures propagate
    #[tokio::test]
    async fn test_listing_database_error() {
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_list_projects()
            .returning(|| Err(DbError::Connection("closed".to_string())));

        let temp = TempDir::new().unwrap();
        let db = Arc::new(mock_db);
        let auth = Arc::new(AuthManager::new(db.clone(), RateLimitConfig::default()));
        let store: Arc<dyn DistributionStore> = Arc::new(FilesystemStore::new(temp.path()));
        let index = PackageIndex::new(db, store, auth, IndexSettings::default());

        let err = index.list_projects().await.unwrap_err();
        assert!(matches!(err, IndexError::Database(_)));
    }
}
