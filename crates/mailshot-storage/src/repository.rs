//! Repository layer for data access

pub mod api_keys;
pub mod attempts;
pub mod campaigns;
pub mod clients;
pub mod messages;
pub mod users;

// Repository traits
pub use api_keys::ApiKeyRepository;
pub use attempts::AttemptRepository;
pub use campaigns::{CampaignRepository, ClaimKind};
pub use clients::ClientRepository;
pub use messages::MessageRepository;
pub use users::UserRepository;

// Database implementations
pub use api_keys::DbApiKeyRepository;
pub use attempts::DbAttemptRepository;
pub use campaigns::DbCampaignRepository;
pub use clients::DbClientRepository;
pub use messages::DbMessageRepository;
pub use users::DbUserRepository;

// Re-export API key types
pub use api_keys::{ApiKey, ApiKeyId};
