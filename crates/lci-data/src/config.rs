//! Connection settings for the soda4LCA catalog and the local dataset cache.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::errors::LciDataError;

/// Public OEKOBAU.DAT node, used for process lookups when no catalog URL is
/// configured.
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://www.oekobaudat.de/OEKOBAU.DAT/resource";

pub const DEFAULT_CACHE_DIR: &str = "data/soda4lca_cache";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Bearer token, used only when no username/password pair is set.
    pub token: Option<String>,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
    /// Retries after a timeout, rate limit or dropped connection.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further one.
    pub retry_backoff: Duration,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            password: None,
            token: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl CatalogSettings {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Configured base URL without a trailing slash.
    pub fn configured_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    pub(crate) fn http_client(&self) -> Result<Client, LciDataError> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }

    /// Basic auth when both username and password are set, else a bearer
    /// token if one is set.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.username, &self.password, &self.token) {
            (Some(user), Some(password), _) => request.basic_auth(user, Some(password)),
            (_, _, Some(token)) => request.bearer_auth(token),
            _ => request,
        }
    }
}
