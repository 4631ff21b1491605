//! # Bloc Common Library
//!
//! Shared code for the bouldering results services:
//! - Error taxonomy and `Result` alias
//! - Root folder and TOML configuration resolution
//! - SQLite schema, entity models and lock-retry helper
//! - Results snapshot types and the per-competition `ResultsHub`
//! - Server-Sent Events helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
pub use events::{ResultsHub, ResultsSnapshot};
