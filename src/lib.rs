//! Draft Review Sync - live review feedback for a blog publishing client.
//!
//! Listens to the review service's notification stream and reconciles each
//! notification against the locally cached drafts or pending reviews,
//! writing reviewer feedback through to the post service.
//!
//! Logging goes through the `log` facade; the embedding application installs
//! the logger.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::SyncConfig;
pub use error::AppError;
