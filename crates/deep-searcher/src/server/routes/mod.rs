//! API routes for the deep-searcher server

pub mod config;
pub mod load;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/set-provider-config", post(config::set_provider_config))
        .route("/load-files", post(load::load_files))
        .route("/load-website", post(load::load_website))
        .route("/query", get(query::query))
}
