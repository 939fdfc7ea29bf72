use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which adapter implementation drives a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Mercadolibre,
    JsonFeed,
    XmlFeed,
    CsvFeed,
    AmazonPaapi,
    Unsupported,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Mercadolibre => write!(f, "mercadolibre"),
            AdapterKind::JsonFeed => write!(f, "json_feed"),
            AdapterKind::XmlFeed => write!(f, "xml_feed"),
            AdapterKind::CsvFeed => write!(f, "csv_feed"),
            AdapterKind::AmazonPaapi => write!(f, "amazon_paapi"),
            AdapterKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Per-store adapter settings. Each adapter honors a subset; unknown keys
/// in the YAML are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    pub feed_url: Option<String>,
    /// Dotted path to the product array inside a JSON document.
    pub product_path: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: Option<String>,
    #[serde(alias = "access_token")]
    pub token: Option<String>,
    /// Canonical field name to source column/key.
    pub column_mapping: BTreeMap<String, String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub partner_tag: Option<String>,
    pub site_id: Option<String>,
    /// Shown when an `unsupported` store is skipped.
    pub reason: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Short CLI identifier, e.g. `mercadolibre`.
    pub key: String,
    /// Display name persisted in the `stores` table.
    pub name: String,
    pub url: String,
    pub adapter: AdapterKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Requests per second; each adapter has its own default.
    #[serde(default)]
    pub rate_limit: Option<u32>,
    #[serde(default)]
    pub settings: AdapterSettings,
}

#[derive(Debug, Deserialize)]
pub struct StoresFile {
    pub stores: Vec<StoreConfig>,
}

impl StoresFile {
    /// Looks up a store by its key, case-insensitively.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&StoreConfig> {
        self.stores
            .iter()
            .find(|s| s.key.eq_ignore_ascii_case(key))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &StoreConfig> {
        self.stores.iter().filter(|s| s.enabled)
    }
}

/// Load and validate the stores configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_stores(path: &Path) -> Result<StoresFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::StoresFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_stores(&content)
}

/// Parse and validate stores YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_stores(content: &str) -> Result<StoresFile, ConfigError> {
    let stores_file: StoresFile =
        serde_yaml::from_str(content).map_err(ConfigError::StoresFileParse)?;

    validate_stores(&stores_file)?;

    Ok(stores_file)
}

fn validate_stores(stores_file: &StoresFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_keys = HashSet::new();

    for store in &stores_file.stores {
        if store.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store name must be non-empty".to_string(),
            ));
        }
        if store.key.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "store '{}' has an empty key",
                store.name
            )));
        }

        let url = store.url.to_ascii_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "store '{}' has invalid url '{}'; must be absolute http(s)",
                store.name, store.url
            )));
        }

        if store.rate_limit == Some(0) {
            return Err(ConfigError::Validation(format!(
                "store '{}' has rate_limit 0; must be at least 1",
                store.name
            )));
        }

        if !seen_names.insert(store.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate store name: '{}'",
                store.name
            )));
        }
        if !seen_keys.insert(store.key.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate store key: '{}'",
                store.key
            )));
        }
    }

    Ok(())
}
