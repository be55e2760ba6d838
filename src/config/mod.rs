//! Configuration module for humidor
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use humidor::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("humidor.toml")).unwrap();
//! println!("Harvesting {} from page {}", config.connector.name, config.harvest.page_min);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConnectorConfig, FieldSelectors, HarvestConfig, StoreConfig, TransportConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::{LIMIT_PLACEHOLDER, PAGE_PLACEHOLDER};
pub(crate) use validation::parse_path;
