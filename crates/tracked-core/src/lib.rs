//! Tracked Core - Foundation crate for the Tracked server finder.
//!
//! This crate provides the shared types, error handling and configuration
//! management that the scanner and the application shell depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`PlaceId`, `ServerInstance`, `SortOrder`)
//!
//! # Example
//!
//! ```rust
//! use tracked_core::{AppConfig, PlaceId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.api.page_size, 100);
//!
//! let place = PlaceId::new("920587237")?;
//! assert_eq!(place.as_str(), "920587237");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AppConfig, AutoBlockerConfig, FetchConfig, FreshnessWeights, GeneralWeights,
    HuntConfig, NewServerConfig, OrchestratorConfig, ScanConfig, ScoringConfig,
};
pub use error::{ConfigError, ConfigResult, Result, TrackedError};
pub use types::{PlaceId, ScoredServerInstance, ServerInstance, SortOrder};
