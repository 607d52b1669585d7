//! Mailshot Storage - Database access
//!
//! This crate provides the PostgreSQL pool, embedded migrations, the
//! entity models and the repository layer used by the dispatcher and the API.

pub mod db;
pub mod models;
pub mod repository;
pub mod scope;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
pub use scope::AccessScope;
