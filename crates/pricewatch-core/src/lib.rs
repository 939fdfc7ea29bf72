pub mod app_config;
pub mod config;
pub mod product;
pub mod slug;
pub mod stores;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use product::{clean_name, validate_products, Product, DEFAULT_CURRENCY};
pub use slug::slugify;
pub use stores::{load_stores, parse_stores, AdapterKind, AdapterSettings, StoreConfig, StoresFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read stores file {path}: {source}")]
    StoresFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse stores file: {0}")]
    StoresFileParse(#[source] serde_yaml::Error),

    #[error("stores file validation failed: {0}")]
    Validation(String),
}
