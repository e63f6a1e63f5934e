use std::path::PathBuf;

use ecomap_core::mapping::mapping_constants::{DEFAULT_MIN_AUTO, DEFAULT_MIN_CANDIDATE};
use ecomap_lci::config::{DEFAULT_CACHE_DIR, DEFAULT_MAX_RETRIES};
use ecomap_lci::CatalogSettings;

pub struct Config {
    pub db_path: String,
    pub min_candidate: f64,
    pub min_auto: f64,
    pub catalog: CatalogSettings,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let float = |key: &str, default: f64| {
            non_empty(key)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(default)
        };

        let catalog = CatalogSettings {
            base_url: non_empty("ECOMAP_SODA4LCA_BASE_URL"),
            username: non_empty("ECOMAP_SODA4LCA_USER"),
            password: non_empty("ECOMAP_SODA4LCA_PASSWORD"),
            token: non_empty("ECOMAP_SODA4LCA_TOKEN"),
            cache_dir: PathBuf::from(
                non_empty("ECOMAP_CACHE_DIR").unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
            ),
            max_retries: non_empty("ECOMAP_SODA4LCA_MAX_RETRIES")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            ..CatalogSettings::default()
        };

        Self {
            db_path: non_empty("ECOMAP_DB_PATH").unwrap_or_else(|| "./db/ecomap.db".into()),
            min_candidate: float("ECOMAP_MIN_CANDIDATE", DEFAULT_MIN_CANDIDATE),
            min_auto: float("ECOMAP_MIN_AUTO", DEFAULT_MIN_AUTO),
            catalog,
            log_format: non_empty("ECOMAP_LOG_FORMAT").unwrap_or_else(|| "text".into()),
        }
    }
}
