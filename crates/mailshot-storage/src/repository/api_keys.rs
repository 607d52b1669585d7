//! API Key repository

use crate::db::{db_err, DatabasePool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailshot_common::types::UserId;
use mailshot_common::Result;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// API Key ID type
pub type ApiKeyId = Uuid;

/// API Key model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub scopes: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Check if the API key has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < Utc::now())
    }

    /// Get scopes as a vector
    pub fn scopes_vec(&self) -> Vec<String> {
        serde_json::from_value(self.scopes.clone()).unwrap_or_default()
    }
}

/// API key repository trait
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Find unexpired API keys by prefix (for initial lookup)
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>>;

    /// Update last_used_at timestamp
    async fn update_last_used(&self, id: ApiKeyId) -> Result<()>;
}

/// Database API key repository
pub struct DbApiKeyRepository {
    pool: DatabasePool,
}

impl DbApiKeyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for DbApiKeyRepository {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKey>> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT id, user_id, name, key_hash, key_prefix, scopes,
                   expires_at, last_used_at, created_at
            FROM api_keys
            WHERE key_prefix = $1
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 10
            "#,
        )
        .bind(prefix)
        .fetch_all(self.pool.pool())
        .await
        .map_err(db_err)
    }

    async fn update_last_used(&self, id: ApiKeyId) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(self.pool.pool())
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
