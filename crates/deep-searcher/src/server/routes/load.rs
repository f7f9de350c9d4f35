//! Ingestion endpoints

use axum::{extract::State, Json};
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::ingestion::LoadReport;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoadFilesRequest {
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub collection_description: Option<String>,
    #[serde(default)]
    pub force_new_collection: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoadWebsiteRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub collection_description: Option<String>,
    #[serde(default)]
    pub force_new_collection: bool,
}

/// POST /load-files
pub async fn load_files(
    State(state): State<AppState>,
    Json(request): Json<LoadFilesRequest>,
) -> Result<Json<LoadReport>> {
    if request.paths.is_empty() {
        return Err(Error::config("`paths` must not be empty"));
    }

    tracing::info!("Loading {} paths", request.paths.len());

    let report = state
        .searcher()
        .load_from_local_files(
            &request.paths,
            request.collection_name.as_deref(),
            request.collection_description.as_deref(),
            request.force_new_collection,
        )
        .await?;

    Ok(Json(report))
}

/// POST /load-website
pub async fn load_website(
    State(state): State<AppState>,
    Json(request): Json<LoadWebsiteRequest>,
) -> Result<Json<LoadReport>> {
    if request.urls.is_empty() {
        return Err(Error::config("`urls` must not be empty"));
    }

    tracing::info!("Crawling {} URLs", request.urls.len());

    let report = state
        .searcher()
        .load_from_website(
            &request.urls,
            request.collection_name.as_deref(),
            request.collection_description.as_deref(),
            request.force_new_collection,
        )
        .await?;

    Ok(Json(report))
}
