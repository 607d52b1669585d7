//! Mailshot API - REST API server
//!
//! This crate provides the REST API for Mailshot: API-key authentication,
//! CRUD for clients, messages and campaigns, the manual "send now" trigger,
//! attempt queries, and the administrative bulk disable.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::AppState;
pub use routes::create_router;
