//! Attempt log queries

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mailshot_common::Error;
use mailshot_storage::{Attempt, AttemptCounts};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{AppState, AuthContext};
use crate::error::ApiResult;

/// Time window for attempt listings; both ends inclusive
#[derive(Debug, Clone, Deserialize)]
pub struct AttemptWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AttemptWindow {
    /// Open ends default to the Unix epoch and `now`
    fn bounds(&self, now: DateTime<Utc>) -> mailshot_common::Result<(DateTime<Utc>, DateTime<Utc>)> {
        let from = self.from.unwrap_or_default();
        let to = self.to.unwrap_or(now);
        if to < from {
            return Err(Error::Validation("'to' is before 'from'".to_string()));
        }
        Ok((from, to))
    }
}

/// GET /api/v1/attempts?from=&to=
pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(window): Query<AttemptWindow>,
) -> ApiResult<Json<Vec<Attempt>>> {
    let (from, to) = window.bounds(Utc::now())?;
    let attempts = state.attempts.list_between(&auth.scope(), from, to).await?;
    Ok(Json(attempts))
}

/// GET /api/v1/attempts/counts
pub async fn count_attempts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AttemptCounts>> {
    let counts = state.attempts.count_by_status(&auth.scope()).await?;
    Ok(Json(counts))
}

/// Most recent attempt of each campaign
///
/// GET /api/v1/attempts/latest
pub async fn latest_attempts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Attempt>>> {
    let attempts = state.attempts.latest_per_campaign(&auth.scope()).await?;
    Ok(Json(attempts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_window_defaults() {
        let now = Utc::now();
        let window = AttemptWindow {
            from: None,
            to: None,
        };
        assert_eq!(window.bounds(now).unwrap(), (DateTime::<Utc>::default(), now));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let now = Utc::now();
        let window = AttemptWindow {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
        };
        assert!(window.bounds(now).is_err());
    }
}
