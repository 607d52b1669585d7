//! Mailshot Common - Shared types and utilities
//!
//! This crate provides configuration, the error type, and identifier
//! types shared across all Mailshot components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
