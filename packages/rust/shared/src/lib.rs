//! Shared types, error model, and configuration for skywatch.
//!
//! This crate is the foundation depended on by all other skywatch crates.
//! It provides:
//! - [`SkywatchError`] — the unified error type
//! - Domain types ([`Icao`], [`Status`], [`StatusEvent`], [`AirportRecord`], [`StatusSnapshot`])
//! - Configuration ([`AppConfig`], [`FeedConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExtractConfig, FeedConfig, FeedSection, PathsConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{Result, SkywatchError};
pub use types::{AirportRecord, Icao, Status, StatusEvent, StatusSnapshot};
