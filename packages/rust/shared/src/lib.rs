//! Shared types, error model, and configuration for csv2md.
//!
//! This crate is the foundation depended on by all other csv2md crates.
//! It provides:
//! - [`Csv2MdError`], the unified error type
//! - Dataset types ([`Metadata`], [`DatasetTable`]) and runtime views ([`CsvSchema`], [`IndexMapping`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DatasetConfig, DefaultsConfig, ErrorPolicy, GithubConfig,
    MarkdownConfig, MetadataField, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Csv2MdError, Result};
pub use types::{CsvSchema, DatasetTable, IndexMapping, Metadata};
