//! HTTP router for pypi-index
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - The distutils endpoint (`POST /` and `POST /simple/`)
//! - Simple HTML listing pages and file downloads
//! - Health checks and static assets

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::AUTH_REALM;
use crate::database::Database;
use crate::error::IndexError;
use crate::forms::DistutilsForm;
use crate::index::{ActionOutcome, PackageIndex, RequestContext};
use crate::models::url_path;
use crate::views;

use super::middleware::{logging_middleware, tracing_middleware};

/// Shared application state
pub struct AppState<D: Database> {
    /// Package index service
    pub index: Arc<PackageIndex<D>>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state holding the package index
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Index and distutils endpoint
        .route("/", get(index_handler::<D>).post(distutils_handler::<D>))
        .route("/simple", get(index_handler::<D>).post(distutils_handler::<D>))
        .route("/simple/", get(index_handler::<D>).post(distutils_handler::<D>))
        // Project pages
        .route("/simple/:dist_name", get(add_trailing_slash))
        .route("/simple/:dist_name/", get(show_links_handler::<D>))
        .route("/pypi/:dist_name/", get(show_links_handler::<D>))
        .route("/simple/:dist_name/:version/", get(show_version_handler::<D>))
        // Files
        .route("/packages/:project/:filename", get(download_handler::<D>))
        .route("/static/*path", get(static_handler))
        .layer(body_limit)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(tracing_middleware))
        .with_state(state)
}

impl IntoResponse for IndexError {
    fn into_response(self) -> Response {
        let status = match &self {
            IndexError::Unauthorized => StatusCode::UNAUTHORIZED,
            IndexError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            IndexError::Forbidden(_) => StatusCode::FORBIDDEN,
            IndexError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IndexError::NotFound => StatusCode::NOT_FOUND,
            IndexError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            IndexError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            IndexError::Database(_) | IndexError::Storage(_) | IndexError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
            }
        };

        let body = self.to_string();
        let mut response = (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            let challenge = format!("Basic realm=\"{}\"", AUTH_REALM);
            if let Ok(value) = challenge.parse() {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

// =============================================================================
// Health
// =============================================================================

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Distutils endpoint
// =============================================================================

/// Handle a distutils POST (`:action` dispatch)
async fn distutils_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    form: DistutilsForm,
) -> Result<Response, IndexError> {
    let ctx = RequestContext {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
        client_ip: connect_info.map(|ConnectInfo(addr)| addr.ip()),
    };

    let outcome = state.index.dispatch(&form, ctx).await?;

    Ok(match outcome {
        ActionOutcome::Accepted => StatusCode::OK.into_response(),
        ActionOutcome::UserCreated => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            "OK\n",
        )
            .into_response(),
    })
}

// =============================================================================
// Listing pages
// =============================================================================

/// Project list
async fn index_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
) -> Result<Html<String>, IndexError> {
    let projects = state.index.list_projects().await?;
    Ok(Html(views::render_index(
        &state.index.settings().title,
        &projects,
    )))
}

/// Redirect `/simple/{name}` to its canonical form
async fn add_trailing_slash(Path(dist_name): Path<String>) -> Redirect {
    Redirect::permanent(&url_path(&["simple", &dist_name], true))
}

/// Links to every file of a project
async fn show_links_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(dist_name): Path<String>,
) -> Result<Html<String>, IndexError> {
    let (project, releases) = state.index.project_releases(&dist_name).await?;
    Ok(Html(views::render_links(&project, &releases)))
}

/// One version of a project
async fn show_version_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path((dist_name, version)): Path<(String, String)>,
) -> Result<Html<String>, IndexError> {
    let (project, releases) = state.index.version_releases(&dist_name, &version).await?;
    Ok(Html(views::render_version(&project, &version, &releases)))
}

// =============================================================================
// Files
// =============================================================================

/// Serve a stored distribution file
async fn download_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path((project, filename)): Path<(String, String)>,
) -> Result<Response, IndexError> {
    let (release, data) = state.index.download(&project, &filename).await?;

    let mime_type = mime_guess::from_path(&release.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!("attachment; filename=\"{}\"", release.filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// Serve embedded assets
async fn static_handler(Path(path): Path<String>) -> Response {
    views::serve_static(&path)
}
