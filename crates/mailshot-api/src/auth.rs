//! Authentication module

use crate::error::ApiError;
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use mailshot_common::types::UserId;
use mailshot_common::Error;
use mailshot_core::{CampaignManager, Dispatcher, ManualTrigger};
use mailshot_storage::{
    AccessScope, ApiKey, ApiKeyRepository, AttemptRepository, CampaignRepository,
    ClientRepository, DatabasePool, DbApiKeyRepository, DbAttemptRepository,
    DbCampaignRepository, DbClientRepository, DbMessageRepository, DbUserRepository,
    MessageRepository, UserRepository,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Scope that lifts owner filtering
pub const SCOPE_VIEW_ALL: &str = "mailings:view_all";
/// Scope required for the administrative bulk disable
pub const SCOPE_DISABLE: &str = "mailings:disable";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub manager: Arc<CampaignManager>,
    pub trigger: ManualTrigger,
}

impl AppState {
    pub fn new(db_pool: DatabasePool, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            api_keys: Arc::new(DbApiKeyRepository::new(db_pool.clone())),
            users: Arc::new(DbUserRepository::new(db_pool.clone())),
            clients: Arc::new(DbClientRepository::new(db_pool.clone())),
            messages: Arc::new(DbMessageRepository::new(db_pool.clone())),
            campaigns: Arc::new(DbCampaignRepository::new(db_pool.clone())),
            attempts: Arc::new(DbAttemptRepository::new(db_pool.clone())),
            manager: Arc::new(CampaignManager::from_pool(db_pool.clone())),
            trigger: ManualTrigger::new(dispatcher),
            db_pool,
        }
    }
}

/// Authenticated context extracted from API key
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The user this API key belongs to
    pub user_id: UserId,
    /// Whether that user is a superuser
    pub is_superuser: bool,
    /// Scopes granted to this API key
    pub scopes: Vec<String>,
    /// API key ID for audit logging
    pub api_key_id: Uuid,
}

impl AuthContext {
    /// Check if the authenticated context has a specific scope
    pub fn has_scope(&self, scope: &str) -> bool {
        self.is_superuser || self.scopes.iter().any(|s| s == "*" || s == scope)
    }

    /// Rows this caller may see and modify
    pub fn scope(&self) -> AccessScope {
        if self.has_scope(SCOPE_VIEW_ALL) {
            AccessScope::All
        } else {
            AccessScope::Owner(self.user_id)
        }
    }
}

/// Extract API key from request
pub fn extract_api_key(req: &Request) -> Option<&str> {
    // Check Authorization header
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(key) = auth_str.strip_prefix("Bearer ") {
                return Some(key);
            }
        }
    }

    // Check X-API-Key header
    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str);
        }
    }

    None
}

/// Extract the prefix from an API key (first 8 characters)
fn extract_key_prefix(api_key: &str) -> Option<&str> {
    api_key.get(..8)
}

/// Hash an API key for comparison
fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Verify an API key against a stored hash.
///
/// Supports both Argon2 hashes (`$argon2...`) and plain SHA-256 hex hashes.
fn verify_api_key(api_key: &str, stored_hash: &str) -> bool {
    if stored_hash.starts_with("$argon2") {
        return PasswordHash::new(stored_hash)
            .ok()
            .and_then(|parsed_hash| {
                Argon2::default()
                    .verify_password(api_key.as_bytes(), &parsed_hash)
                    .ok()
            })
            .is_some();
    }

    hash_api_key(api_key) == stored_hash
}

/// Validate an API key against the database
async fn validate_api_key(state: &AppState, api_key: &str) -> Result<ApiKey, StatusCode> {
    let prefix = extract_key_prefix(api_key).ok_or_else(|| {
        warn!("API key too short");
        StatusCode::UNAUTHORIZED
    })?;

    // Find potential matches by prefix
    let candidates = state.api_keys.find_by_prefix(prefix).await.map_err(|e| {
        error!("Database error while looking up API key: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if candidates.is_empty() {
        warn!("No API key found with prefix: {}", prefix);
        return Err(StatusCode::UNAUTHORIZED);
    }

    for candidate in candidates {
        if verify_api_key(api_key, &candidate.key_hash) {
            if candidate.is_expired() {
                warn!("API key {} has expired", candidate.id);
                return Err(StatusCode::UNAUTHORIZED);
            }

            // Don't fail auth on this
            let api_keys = Arc::clone(&state.api_keys);
            let key_id = candidate.id;
            tokio::spawn(async move {
                if let Err(e) = api_keys.update_last_used(key_id).await {
                    error!("Failed to update API key last_used_at: {}", e);
                }
            });

            debug!(
                "API key {} authenticated for user {}",
                candidate.id, candidate.user_id
            );
            return Ok(candidate);
        }
    }

    warn!("API key hash mismatch for prefix: {}", prefix);
    Err(StatusCode::UNAUTHORIZED)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Skip auth for health check endpoints
    if request.uri().path().starts_with("/health") {
        return Ok(next.run(request).await);
    }

    let api_key = extract_api_key(&request).ok_or_else(|| {
        warn!("Missing API key in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    let validated_key = validate_api_key(&state, api_key).await?;

    let user = state
        .users
        .get(validated_key.user_id)
        .await
        .map_err(|e| {
            error!("Database error while loading API key owner: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            warn!("API key {} belongs to a missing user", validated_key.id);
            StatusCode::UNAUTHORIZED
        })?;

    let auth_context = AuthContext {
        user_id: user.id,
        is_superuser: user.is_superuser,
        scopes: validated_key.scopes_vec(),
        api_key_id: validated_key.id,
    };

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

/// Check if the authenticated user has a specific scope
pub fn require_scope(auth_context: &AuthContext, scope: &str) -> Result<(), ApiError> {
    if !auth_context.has_scope(scope) {
        warn!(
            "Scope access denied: API key {} lacks scope '{}'",
            auth_context.api_key_id, scope
        );
        return Err(ApiError(Error::PermissionDenied(format!(
            "missing scope '{}'",
            scope
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    use axum::body::Body;
    use pretty_assertions::assert_eq;

    fn context(scopes: &[&str], is_superuser: bool) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            is_superuser,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            api_key_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn verifies_sha256_hash() {
        let api_key = "ms_test_legacy_key";
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        let legacy_hash = hex::encode(hasher.finalize());

        assert!(verify_api_key(api_key, &legacy_hash));
        assert!(!verify_api_key("wrong_key", &legacy_hash));
    }

    #[test]
    fn verifies_argon2_hash() {
        let api_key = "ms_test_argon2_key";
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(api_key.as_bytes(), &salt)
            .expect("argon2 hash generation should succeed")
            .to_string();

        assert!(verify_api_key(api_key, &hash));
        assert!(!verify_api_key("wrong_key", &hash));
    }

    #[test]
    fn short_keys_have_no_prefix() {
        assert_eq!(extract_key_prefix("ms_abcdef123"), Some("ms_abcde"));
        assert_eq!(extract_key_prefix("short"), None);
    }

    #[test]
    fn extracts_key_from_headers() {
        let request = Request::builder()
            .header("authorization", "Bearer ms_live_key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&request), Some("ms_live_key"));

        let request = Request::builder()
            .header("x-api-key", "ms_other_key")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_api_key(&request), Some("ms_other_key"));

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_api_key(&request), None);
    }

    #[test]
    fn owner_scope_by_default() {
        let auth = context(&["mailings:read"], false);
        assert_eq!(auth.scope(), AccessScope::Owner(auth.user_id));
        assert!(require_scope(&auth, SCOPE_DISABLE).is_err());
    }

    #[test]
    fn view_all_and_superuser_lift_owner_filter() {
        assert_eq!(context(&[SCOPE_VIEW_ALL], false).scope(), AccessScope::All);
        assert_eq!(context(&["*"], false).scope(), AccessScope::All);

        let superuser = context(&[], true);
        assert_eq!(superuser.scope(), AccessScope::All);
        assert!(require_scope(&superuser, SCOPE_DISABLE).is_ok());
    }
}
