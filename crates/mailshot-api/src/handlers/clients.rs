//! Client handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mailshot_common::types::EmailAddress;
use mailshot_common::{Error, Result};
use mailshot_storage::{Client, CreateClient, UpdateClient};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::Pagination;
use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

fn normalize_email(email: &str) -> Result<String> {
    Ok(email.trim().parse::<EmailAddress>()?.to_string())
}

/// List clients
///
/// GET /api/v1/clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Client>>> {
    let (limit, offset) = page.bounds()?;
    let clients = state.clients.list(&auth.scope(), limit, offset).await?;
    Ok(Json(clients))
}

/// Create a client owned by the caller
///
/// POST /api/v1/clients
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(mut input): Json<CreateClient>,
) -> ApiResult<(StatusCode, Json<Client>)> {
    input.email = normalize_email(&input.email)?;

    let client = state.clients.create(Some(auth.user_id), input).await?;
    info!("Created client {} for user {}", client.id, auth.user_id);

    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /api/v1/clients/:client_id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<Json<Client>> {
    let client = state
        .clients
        .get(&auth.scope(), client_id)
        .await?
        .ok_or_else(|| Error::NotFound("Client not found".to_string()))?;
    Ok(Json(client))
}

/// PUT /api/v1/clients/:client_id
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(client_id): Path<Uuid>,
    Json(mut input): Json<UpdateClient>,
) -> ApiResult<Json<Client>> {
    if let Some(email) = input.email.take() {
        input.email = Some(normalize_email(&email)?);
    }

    let client = state
        .clients
        .update(&auth.scope(), client_id, input)
        .await?
        .ok_or_else(|| Error::NotFound("Client not found".to_string()))?;
    Ok(Json(client))
}

/// DELETE /api/v1/clients/:client_id
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.clients.delete(&auth.scope(), client_id).await? {
        return Err(Error::NotFound("Client not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
