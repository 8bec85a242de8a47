//! Shared types, error model, and configuration for orderpack.
//!
//! This crate is the foundation depended on by all other orderpack crates.
//! It provides:
//! - [`OrderpackError`] — the unified error type
//! - Domain types ([`Order`], [`DocumentDescriptor`], [`Component`],
//!   [`SubTask`], [`CompositionOptions`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - The [`ProgressReporter`] trait used across the pipeline

pub mod config;
pub mod error;
pub mod progress;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, PipelineConfig, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{OrderpackError, Result};
pub use progress::{ProgressReporter, SilentProgress};
pub use types::{
    Component, CompositionOptions, DocumentDescriptor, MaterialStatus, Order, OrderStatus,
    Priority, SubTask,
};
