//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mailshot_common::Error;
use mailshot_core::DispatchReport;
use mailshot_storage::{
    AccessScope, Attempt, Campaign, CampaignStatus, Client, CreateCampaign, UpdateCampaign,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::Pagination;
use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl ListCampaignsQuery {
    fn page(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Response of a manual send
#[derive(Debug, Serialize)]
pub struct SendResponse {
    #[serde(flatten)]
    pub report: DispatchReport,
    pub summary: String,
}

impl From<DispatchReport> for SendResponse {
    fn from(report: DispatchReport) -> Self {
        let summary = report.summary();
        Self { report, summary }
    }
}

async fn visible_campaign(state: &AppState, scope: &AccessScope, id: Uuid) -> ApiResult<Campaign> {
    let campaign = state
        .campaigns
        .get(scope, id)
        .await?
        .ok_or_else(|| Error::NotFound("Campaign not found".to_string()))?;
    Ok(campaign)
}

/// List campaigns, optionally filtered by status
///
/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListCampaignsQuery>,
) -> ApiResult<Json<Vec<Campaign>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<CampaignStatus>)
        .transpose()
        .map_err(|e| Error::Validation(e.to_string()))?;

    let (limit, offset) = query.page().bounds()?;
    let campaigns = state
        .campaigns
        .list(&auth.scope(), status, limit, offset)
        .await?;
    Ok(Json(campaigns))
}

/// Create a campaign owned by the caller
///
/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateCampaign>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state
        .manager
        .create(&auth.scope(), Some(auth.user_id), input)
        .await?;

    info!("Created campaign {} for user {}", campaign.id, auth.user_id);

    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let campaign = visible_campaign(&state, &auth.scope(), campaign_id).await?;
    Ok(Json(campaign))
}

/// Update window, message, or recipients
///
/// PUT /api/v1/campaigns/:campaign_id
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    Json(input): Json<UpdateCampaign>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state
        .manager
        .update(&auth.scope(), campaign_id, input)
        .await?
        .ok_or_else(|| Error::NotFound("Campaign not found".to_string()))?;
    Ok(Json(campaign))
}

/// DELETE /api/v1/campaigns/:campaign_id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.campaigns.delete(&auth.scope(), campaign_id).await? {
        return Err(Error::NotFound("Campaign not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/campaigns/:campaign_id/recipients
pub async fn list_recipients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Client>>> {
    let campaign = visible_campaign(&state, &auth.scope(), campaign_id).await?;
    let recipients = state.campaigns.recipients(campaign.id).await?;
    Ok(Json(recipients))
}

/// Send the campaign now, ignoring its window
///
/// POST /api/v1/campaigns/:campaign_id/send
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<SendResponse>> {
    let report = state.trigger.send_now(&auth.scope(), campaign_id).await?;
    Ok(Json(report.into()))
}

/// Attempt history of one campaign, newest first
///
/// GET /api/v1/campaigns/:campaign_id/attempts
pub async fn list_campaign_attempts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Attempt>>> {
    let scope = auth.scope();
    let campaign = visible_campaign(&state, &scope, campaign_id).await?;
    let attempts = state.attempts.list_for_campaign(&scope, campaign.id).await?;
    Ok(Json(attempts))
}
