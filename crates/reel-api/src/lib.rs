//! HTTP client for the feed collection API.
//!
//! Fetches the feed, reports views and likes, and reads the per-item product
//! catalog. [`ApiClient`] implements [`reel_engine::Engagement`] so a feed
//! actor can report engagement straight to the server.

pub mod client;
pub mod config;
pub mod error;
pub mod models;

pub use client::{ApiClient, install_rustls_provider};
pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use models::{Product, ViewStatus};
