//! soda4LCA process catalog.
//!
//! Talks to a soda4LCA node's REST service:
//! - Process lookup via `/processes/{uuid}`
//! - Process search via `/processes?search=true`
//!
//! Documents are requested with `format=JSON`.

mod document;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use ecomap_core::bom::BomLine;
use ecomap_core::mapping::{build_query, CandidateProvider, ProcessCandidate, ProcessCatalog};

use crate::config::{CatalogSettings, DEFAULT_CATALOG_BASE_URL};
use crate::errors::{retry_with_backoff, LciDataError};

use document::{parse_process_document, parse_search_page, ProcessDocument, ProcessSearchItem};

pub const PROVIDER_ID: &str = "soda4lca";

const PROCESS_CONFIDENCE: f64 = 0.85;
const SEARCH_CONFIDENCE: f64 = 0.5;
const SEARCH_PAGE_SIZE: &str = "10";
const RULE_UUID_LOOKUP: &str = "soda4lca_uuid";
const RULE_SEARCH: &str = "soda4lca_search";
const FALLBACK_NAME: &str = "soda4LCA process";

/// `soda4lca:{uuid}` with an optional `?version=` suffix.
pub fn catalog_dataset_id(uuid: &str, version: Option<&str>) -> String {
    match version.map(str::trim).filter(|v| !v.is_empty()) {
        Some(version) => format!("{}:{}?version={}", PROVIDER_ID, uuid, version),
        None => format!("{}:{}", PROVIDER_ID, uuid),
    }
}

/// Remote soda4LCA node, usable both as a fuzzy-tier candidate provider and
/// as the process catalog for BOM lines that reference a dataset directly.
pub struct Soda4LcaProvider {
    client: Client,
    settings: CatalogSettings,
    base_url: String,
}

impl Soda4LcaProvider {
    /// Falls back to the public OEKOBAU.DAT node when no base URL is set.
    pub fn new(settings: CatalogSettings) -> Result<Self, LciDataError> {
        let base_url = settings
            .configured_base_url()
            .unwrap_or(DEFAULT_CATALOG_BASE_URL)
            .to_string();
        let client = settings.http_client()?;
        Ok(Self {
            client,
            settings,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET returning the body, or `None` on 404. Transient failures are
    /// retried with backoff.
    async fn fetch(&self, path: &str, params: &[(&str, &str)]) -> Result<Option<String>, LciDataError> {
        retry_with_backoff(
            &format!("soda4LCA request {}", path),
            self.settings.max_retries,
            self.settings.retry_backoff,
            move || self.fetch_once(path, params),
        )
        .await
    }

    async fn fetch_once(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<String>, LciDataError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("soda4LCA request: {} with {} params", path, params.len());

        let request = self
            .settings
            .authorize(self.client.get(&url).query(params))
            .header(reqwest::header::ACCEPT, "application/json");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                LciDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                LciDataError::Network(e)
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
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
            status if !status.is_success() => {
                return Err(LciDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("HTTP {} for {}", status, path),
                })
            }
            _ => {}
        }

        Ok(Some(response.text().await?))
    }

    /// Looks up one process by uuid.
    ///
    /// Returns `Ok(None)` when the node does not know the process or its
    /// document cannot be read; transport failures are errors.
    pub async fn get_process_by_uuid(
        &self,
        uuid: &str,
        version: Option<&str>,
    ) -> Result<Option<ProcessCandidate>, LciDataError> {
        let uuid = uuid.trim();
        if uuid.is_empty() {
            return Ok(None);
        }
        let version = version.map(str::trim).filter(|v| !v.is_empty());

        let mut params = vec![("format", "JSON")];
        if let Some(version) = version {
            params.push(("version", version));
        }

        let Some(body) = self.fetch(&format!("/processes/{}", uuid), &params).await? else {
            debug!("soda4LCA process {} not found", uuid);
            return Ok(None);
        };

        match parse_process_document(&body) {
            Ok(document) => Ok(Some(process_candidate(uuid, version, document))),
            Err(e) => {
                warn!("Could not parse soda4LCA process {}: {}", uuid, e);
                Ok(None)
            }
        }
    }

    /// Name search over the node's processes.
    pub async fn search(&self, query: &str) -> Result<Vec<ProcessCandidate>, LciDataError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let params = [
            ("search", "true"),
            ("name", query),
            ("format", "JSON"),
            ("pageSize", SEARCH_PAGE_SIZE),
        ];
        let Some(body) = self.fetch("/processes", &params).await? else {
            return Ok(Vec::new());
        };

        let items = parse_search_page(&body).map_err(|e| LciDataError::InvalidDocument {
            dataset_id: format!("search:{}", query),
            message: e.to_string(),
        })?;
        Ok(items.into_iter().map(search_candidate).collect())
    }
}

fn process_candidate(uuid: &str, version: Option<&str>, document: ProcessDocument) -> ProcessCandidate {
    let name = document.name.unwrap_or_else(|| FALLBACK_NAME.to_string());
    let mut candidate = ProcessCandidate::new(
        PROVIDER_ID,
        catalog_dataset_id(uuid, version),
        name,
        PROCESS_CONFIDENCE,
        RULE_UUID_LOOKUP,
    )
    .with_description(document.description.unwrap_or_default())
    .with_metadata("uuid", uuid);

    for (key, value) in [
        ("reference_flow", document.reference_flow),
        ("location", document.location),
        ("classification", document.classification),
    ] {
        if let Some(value) = value {
            candidate.metadata.insert(key.to_string(), Value::String(value));
        }
    }
    if let Some(version) = version {
        candidate = candidate.with_metadata("version", version);
    }
    candidate
}

fn search_candidate(item: ProcessSearchItem) -> ProcessCandidate {
    let ProcessSearchItem {
        uuid,
        version,
        name,
        classific,
        geo,
    } = item;
    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let mut candidate = ProcessCandidate::new(
        PROVIDER_ID,
        catalog_dataset_id(&uuid, version.as_deref()),
        name,
        SEARCH_CONFIDENCE,
        RULE_SEARCH,
    )
    .with_description(classific.clone().unwrap_or_default())
    .with_metadata("uuid", uuid);

    if let Some(version) = version {
        candidate = candidate.with_metadata("version", version);
    }
    if let Some(classific) = classific {
        candidate = candidate.with_metadata("classification", classific);
    }
    if let Some(geo) = geo {
        candidate = candidate.with_metadata("location", geo);
    }
    candidate
}

#[async_trait]
impl CandidateProvider for Soda4LcaProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    async fn find_candidates(&self, line: &BomLine) -> ecomap_core::Result<Vec<ProcessCandidate>> {
        Ok(self.search(&build_query(line)).await?)
    }
}

#[async_trait]
impl ProcessCatalog for Soda4LcaProvider {
    async fn get_process(
        &self,
        uuid: &str,
        version: Option<&str>,
    ) -> ecomap_core::Result<Option<ProcessCandidate>> {
        Ok(self.get_process_by_uuid(uuid, version).await?)
    }
}
