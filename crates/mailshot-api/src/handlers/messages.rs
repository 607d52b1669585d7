//! Message template handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mailshot_common::Error;
use mailshot_storage::{CreateMessage, Message, UpdateMessage};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::Pagination;
use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// GET /api/v1/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Message>>> {
    let (limit, offset) = page.bounds()?;
    let messages = state.messages.list(&auth.scope(), limit, offset).await?;
    Ok(Json(messages))
}

/// POST /api/v1/messages
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    if input.subject.trim().is_empty() {
        return Err(Error::Validation("Subject is required".to_string()).into());
    }

    let message = state.messages.create(Some(auth.user_id), input).await?;
    info!("Created message {} for user {}", message.id, auth.user_id);

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/messages/:message_id
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    let message = state
        .messages
        .get(&auth.scope(), message_id)
        .await?
        .ok_or_else(|| Error::NotFound("Message not found".to_string()))?;
    Ok(Json(message))
}

/// PUT /api/v1/messages/:message_id
pub async fn update_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(message_id): Path<Uuid>,
    Json(input): Json<UpdateMessage>,
) -> ApiResult<Json<Message>> {
    if input.subject.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(Error::Validation("Subject cannot be empty".to_string()).into());
    }

    let message = state
        .messages
        .update(&auth.scope(), message_id, input)
        .await?
        .ok_or_else(|| Error::NotFound("Message not found".to_string()))?;
    Ok(Json(message))
}

/// DELETE /api/v1/messages/:message_id
///
/// Campaigns using the message are deleted with it.
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.messages.delete(&auth.scope(), message_id).await? {
        return Err(Error::NotFound("Message not found".to_string()).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
