use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    download::download_handler,
    error::ShareError,
    history::{HistoryStore, UploadRecord},
    listing::list_handler,
    network,
    pages,
    upload::{upload_handler, MAX_UPLOAD_BYTES},
};

pub type SharedState = Arc<AppState>;

/// Everything a request handler may touch during one session.
pub struct AppState {
    /// Canonical path of the shared directory.
    pub root_dir: PathBuf,
    pub history: HistoryStore,
    /// Cancelled when the session stops; long-running uploads watch it.
    pub shutdown: CancellationToken,
    /// How long a download may keep streaming after `shutdown` fires.
    pub shutdown_grace: Duration,
}

impl AppState {
    /// `root_dir` must already be canonical.
    pub fn new(
        root_dir: PathBuf,
        shutdown: CancellationToken,
        shutdown_grace: Duration,
    ) -> SharedState {
        Arc::new(Self {
            history: HistoryStore::open(&root_dir),
            root_dir,
            shutdown,
            shutdown_grace,
        })
    }
}

pub fn build_router(state: SharedState, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/", get(pages::index_handler))
        .route("/upload", get(pages::upload_page_handler))
        .route("/get-ip", get(ip_handler))
        .route(
            "/api/upload",
            post(upload_handler).fallback(method_not_allowed),
        )
        .route("/api/files", get(list_handler))
        .route("/api/history", get(history_handler))
        .route("/download", get(download_handler))
        .route("/download/", get(download_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct IpResponse {
    ip: String,
}

async fn ip_handler() -> Json<IpResponse> {
    Json(IpResponse {
        ip: network::local_ipv4().to_string(),
    })
}

#[derive(Serialize)]
struct HistoryResponse {
    message: &'static str,
    list: Vec<UploadRecord>,
    code: u16,
}

async fn history_handler(State(state): State<SharedState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        message: "Upload history",
        list: state.history.read().await,
        code: 200,
    })
}

async fn method_not_allowed() -> ShareError {
    ShareError::MethodNotAllowed
}
