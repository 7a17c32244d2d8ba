//! Defines the HTTP surface of the service.
//!
//! ## Structure
//! - `POST /upload`           - multipart `files` upload, 201 with per-file results
//! - `GET  /files/{*key}`     - 302 to the object's access URL (key or filename, per config)
//! - `GET  /newsletters`      - list of stored PDFs
//! - `GET  /objects/{*key}`   - payload download, local backend only
//! - `GET  /healthz`, `/readyz`
//!
//! The wildcard `*key` keeps keys like `pdfs/1700000000000_report.pdf` in one parameter.

use crate::{
    errors::{expose_error_details, panic_response},
    handlers::{
        file_handlers::{get_file, get_object, list_newsletters, upload_files},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

/// Build the router for all routes; the caller supplies the state.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_files).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route("/files/{*key}", get(get_file))
        .route("/newsletters", get(list_newsletters))
        .route("/objects/{*key}", get(get_object))
}

/// The fully layered application: routes, error detail rewriting, CORS,
/// request tracing, and panic recovery.
pub fn app(state: AppState) -> Router {
    routes(state.max_body_bytes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            expose_error_details,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}
