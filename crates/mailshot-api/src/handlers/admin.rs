//! Administrative actions

use axum::{extract::State, Extension, Json};
use mailshot_common::types::CampaignId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{require_scope, AppState, AuthContext, SCOPE_DISABLE};
use crate::error::ApiResult;

/// Request body for the bulk disable
#[derive(Debug, Deserialize)]
pub struct DisableCampaignsRequest {
    pub ids: Vec<CampaignId>,
}

#[derive(Debug, Serialize)]
pub struct DisableCampaignsResponse {
    pub updated: u64,
}

/// Force the selected campaigns to `completed`
///
/// POST /api/v1/admin/campaigns/disable
pub async fn disable_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<DisableCampaignsRequest>,
) -> ApiResult<Json<DisableCampaignsResponse>> {
    require_scope(&auth, SCOPE_DISABLE)?;

    let updated = state.manager.disable(&auth.scope(), &input.ids).await?;
    info!(
        "API key {} disabled {} of {} campaigns",
        auth.api_key_id,
        updated,
        input.ids.len()
    );

    Ok(Json(DisableCampaignsResponse { updated }))
}
