//! Error types and retry classification for the LCI data crate.
//!
//! This module provides:
//! - [`LciDataError`]: The error enum for catalog, provider and cache operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;
pub(crate) use retry::retry_with_backoff;

use thiserror::Error;

/// Errors raised while talking to LCI data sources.
#[derive(Error, Debug)]
pub enum LciDataError {
    /// A required setting (base URL, cache directory) is absent.
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// The remote catalog does not know the dataset.
    #[error("Dataset {dataset_id} not found at {provider}")]
    NotFound {
        provider: String,
        dataset_id: String,
    },

    /// Credentials were rejected (HTTP 401/403).
    #[error("Unauthorized: {provider}")]
    Unauthorized { provider: String },

    /// HTTP 429.
    #[error("Rate limited: {provider}")]
    RateLimited { provider: String },

    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    /// Any other unexpected response from the source.
    #[error("Provider error: {provider} - {message}")]
    ProviderError { provider: String, message: String },

    /// The fetched document could not be interpreted.
    #[error("Invalid dataset document {dataset_id}: {message}")]
    InvalidDocument { dataset_id: String, message: String },

    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl LciDataError {
    /// Returns the retry classification for this error.
    ///
    /// ```
    /// use ecomap_lci::errors::{LciDataError, RetryClass};
    ///
    /// let error = LciDataError::Timeout { provider: "soda4lca".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::NotConfigured(_)
            | Self::NotFound { .. }
            | Self::Unauthorized { .. }
            | Self::InvalidDocument { .. } => RetryClass::Never,

            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) => {
                RetryClass::WithBackoff
            }

            Self::ProviderError { .. } | Self::Io(_) => RetryClass::NextProvider,
        }
    }
}

impl From<LciDataError> for ecomap_core::Error {
    fn from(err: LciDataError) -> Self {
        match err {
            LciDataError::NotFound { .. } => ecomap_core::Error::NotFound(err.to_string()),
            other => ecomap_core::Error::External(other.to_string()),
        }
    }
}
