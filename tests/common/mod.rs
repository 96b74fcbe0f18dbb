//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::multipart::{Form, Part};
use tempfile::TempDir;

use pypi_index::auth::{AuthManager, RateLimitConfig};
use pypi_index::config::ServerConfig;
use pypi_index::database::SqliteDatabase;
use pypi_index::index::{IndexSettings, PackageIndex};
use pypi_index::server::{AppState, Server};
use pypi_index::storage::{DistributionStore, FilesystemStore};

/// A running index backed by an in-memory database and a temporary directory
pub struct TestIndex {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub storage_dir: TempDir,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestIndex {
    /// Start an index with default settings
    pub async fn start() -> Self {
        Self::start_with(IndexSettings::default(), RateLimitConfig::default()).await
    }

    /// Start an index with custom settings
    pub async fn start_with(settings: IndexSettings, rate_limit: RateLimitConfig) -> Self {
        let storage_dir = TempDir::new().expect("Failed to create storage dir");

        let database = Arc::new(
            SqliteDatabase::new(":memory:")
                .await
                .expect("Failed to create test database"),
        );
        let auth_manager = Arc::new(AuthManager::new(Arc::clone(&database), rate_limit));
        let store: Arc<dyn DistributionStore> = Arc::new(
            FilesystemStore::new_with_init(storage_dir.path())
                .await
                .expect("Failed to create store"),
        );

        let state = AppState {
            index: Arc::new(PackageIndex::new(database, store, auth_manager, settings)),
            max_upload_bytes: 1024 * 1024,
        };

        let (addr, shutdown) = run_test_server(state).await;

        Self {
            addr,
            client: reqwest::Client::new(),
            storage_dir,
            shutdown: Some(shutdown),
        }
    }

    /// Absolute URL for a path on the test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Create an account through the `user` action
    pub async fn create_user(&self, username: &str, password: &str) -> reqwest::Response {
        let email = format!("{}@example.com", username);
        self.client
            .post(self.url("/"))
            .form(&[
                (":action", "user"),
                ("name", username),
                ("email", email.as_str()),
                ("password", password),
            ])
            .send()
            .await
            .expect("Failed to send request")
    }

    /// POST a multipart form with Basic credentials
    pub async fn post_as(&self, username: &str, password: &str, form: Form) -> reqwest::Response {
        self.client
            .post(self.url("/"))
            .header("Authorization", basic_auth(username, password))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// GET a path on the test server
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }
}

impl Drop for TestIndex {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = Server::new(create_test_server_config(), state);

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    (addr, shutdown_tx)
}

/// Encode an `Authorization: Basic` header value
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Metadata fields sent by `setup.py register`
pub fn register_form(name: &str, version: &str) -> Form {
    metadata_form("submit", name, version)
}

fn metadata_form(action: &'static str, name: &str, version: &str) -> Form {
    Form::new()
        .text(":action", action)
        .text("metadata_version", "1.0")
        .text("name", name.to_string())
        .text("version", version.to_string())
        .text("summary", format!("The {} package", name))
        .text("home_page", "https://example.com/")
        .text("author", "Alice")
        .text("author_email", "alice@example.com")
        .text("license", "BSD")
        .text("description", "Longer text")
}

/// Fields and file sent by `setup.py sdist upload`
pub fn upload_form(name: &str, version: &str, filename: &str, data: &[u8]) -> Form {
    metadata_form("file_upload", name, version)
        .text("filetype", "sdist")
        .text("pyversion", "")
        .text("md5_digest", md5_placeholder())
        .part(
            "content",
            Part::bytes(data.to_vec())
                .file_name(filename.to_string())
                .mime_str("application/octet-stream")
                .expect("valid mime type"),
        )
}

/// A well-formed MD5 digest; the index stores it without recomputing
pub fn md5_placeholder() -> &'static str {
    "0123456789abcdef0123456789abcdef"
}
