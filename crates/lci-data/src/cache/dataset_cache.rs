use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::json;

use ecomap_core::mapping::{DatasetCacheTrait, DatasetReference};

use crate::config::CatalogSettings;
use crate::errors::{retry_with_backoff, LciDataError};
use crate::soda4lca::PROVIDER_ID;

pub const CACHE_FILE_SUFFIX: &str = ".ilcd.json";

const FORBIDDEN_PATH_CHARS: [char; 9] = ['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Replaces characters that are not allowed in file names with `_`.
pub fn sanitize_path_component(value: &str) -> String {
    value
        .chars()
        .map(|c| if FORBIDDEN_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Fetches datasets from the soda4LCA node into `cache_dir/{provider}/`.
pub struct DatasetCache {
    client: Client,
    settings: CatalogSettings,
}

impl DatasetCache {
    pub fn new(settings: CatalogSettings) -> Result<Self, LciDataError> {
        let client = settings.http_client()?;
        Ok(Self { client, settings })
    }

    pub fn cache_path(&self, provider: &str, dataset_id: &str) -> PathBuf {
        self.settings
            .cache_dir
            .join(sanitize_path_component(provider))
            .join(format!("{}{}", sanitize_path_component(dataset_id), CACHE_FILE_SUFFIX))
    }

    /// Returns the cached file for the dataset, downloading it first when it
    /// is not on disk yet.
    ///
    /// JSON responses are stored verbatim; anything else is wrapped as
    /// `{"dataset_id": .., "raw": ..}`.
    pub async fn ensure_dataset_cached(
        &self,
        provider: &str,
        dataset_id: &str,
    ) -> Result<PathBuf, LciDataError> {
        let path = self.cache_path(provider, dataset_id);
        if tokio::fs::try_exists(&path).await? {
            debug!("Dataset {} already cached at {}", dataset_id, path.display());
            return Ok(path);
        }

        let base_url = self.settings.configured_base_url().ok_or_else(|| {
            LciDataError::NotConfigured(
                "soda4LCA base URL not configured; cannot fetch datasets".to_string(),
            )
        })?;
        let contents = retry_with_backoff(
            &format!("Dataset download {}", dataset_id),
            self.settings.max_retries,
            self.settings.retry_backoff,
            move || self.download(base_url, provider, dataset_id),
        )
        .await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        info!("Cached dataset {} at {}", dataset_id, path.display());
        Ok(path)
    }

    async fn download(
        &self,
        base_url: &str,
        provider: &str,
        dataset_id: &str,
    ) -> Result<String, LciDataError> {
        let url = format!("{}/rest/datasets/{}", base_url, dataset_id);

        let response = self
            .settings
            .authorize(self.client.get(&url))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LciDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    LciDataError::Network(e)
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => {
                return Err(LciDataError::NotFound {
                    provider: provider.to_string(),
                    dataset_id: dataset_id.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(LciDataError::Unauthorized {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(LciDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            s if !s.is_success() => {
                return Err(LciDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("HTTP {} fetching dataset {}", s, dataset_id),
                })
            }
            _ => {}
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        let body = response.text().await?;
        Ok(if is_json {
            body
        } else {
            json!({ "dataset_id": dataset_id, "raw": body }).to_string()
        })
    }
}

#[async_trait]
impl DatasetCacheTrait for DatasetCache {
    async fn build_reference(
        &self,
        provider: &str,
        dataset_id: &str,
    ) -> ecomap_core::Result<DatasetReference> {
        let path = self.ensure_dataset_cached(provider, dataset_id).await?;
        Ok(DatasetReference {
            database: format!("{}:{}", PROVIDER_ID, provider.to_lowercase()),
            code: dataset_id.to_string(),
            source: PROVIDER_ID.to_string(),
            cache_path: path.to_string_lossy().into_owned(),
        })
    }
}
