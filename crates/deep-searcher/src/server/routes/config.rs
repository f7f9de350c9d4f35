//! Provider reconfiguration endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::config::ProviderOptions;
use crate::error::Result;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProviderConfigRequest {
    /// Capability name: embedding, llm, vector_db, file_loader or web_crawler
    pub feature: String,
    pub provider: String,
    #[serde(default)]
    pub config: ProviderOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderConfigResponse {
    pub message: String,
    pub feature: String,
    pub provider: String,
}

/// POST /set-provider-config
pub async fn set_provider_config(
    State(state): State<AppState>,
    Json(request): Json<ProviderConfigRequest>,
) -> Result<Json<ProviderConfigResponse>> {
    state
        .set_provider_config(&request.feature, &request.provider, request.config)
        .await?;

    Ok(Json(ProviderConfigResponse {
        message: "Provider configuration updated".to_string(),
        feature: request.feature,
        provider: request.provider,
    }))
}
