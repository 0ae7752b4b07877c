//! Pagebot Common - Shared configuration, errors, and logging for the Pagebot relay.
//!
//! This crate provides:
//! - Configuration types and loading (YAML file plus environment overrides)
//! - Error types and context helpers
//! - Logging setup (pretty console or JSON file output)

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    AssistantConfig, Config, FacebookConfig, ObservabilityConfig, SentimentConfig, ServerConfig,
};
pub use error::{Error, Result};
