//! Signing relay API
//!
//! Accepts Word document uploads, and on request converts one to PDF,
//! stamps a signer attestation and signature image onto its first page,
//! and mails the result to a fixed mailbox.
//!
//! - `POST /upload` - multipart upload, returns a share link
//! - `POST /sign/:fileId` - convert, stamp and deliver
//! - `GET /documents/:fileId` - document state
//! - `GET /health`

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod convert;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod state;
pub mod store;


pub use config::Config;
pub use state::{AppState, SigningSettings};

/// Build the router with CORS restricted to `allowed_origin`
pub fn build_router(state: Arc<AppState>, allowed_origin: HeaderValue, body_limit: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Intake
        .route("/upload", post(handlers::upload))
        // Sign and deliver
        .route("/sign/:file_id", post(handlers::sign))
        .route("/documents/:file_id", get(handlers::get_document))
        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
