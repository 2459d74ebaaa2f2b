//! pwsync core library.
//!
//! This crate provides the building blocks for copying account passwords
//! between two Kerio-style `users.cfg` documents: a lossless XML document
//! model, user-record access by (domain, name), configuration, and the
//! synchronizer itself.

pub mod config;
pub mod document;
pub mod errors;
pub mod models;
pub mod sync_engine;
pub mod users;

// Re-exports for convenience.
pub use config::SyncConfig;
pub use document::Document;
pub use sync_engine::PasswordSync;
