//! Ecomap LCI data - sources of process datasets.
//!
//! This crate provides the [`CandidateProvider`](ecomap_core::mapping::CandidateProvider)
//! implementations used by the fuzzy tier, the soda4LCA process catalog used
//! for direct dataset references, and the filesystem dataset cache.

pub mod cache;
pub mod config;
pub mod errors;
pub mod provider;
pub mod soda4lca;

pub use cache::DatasetCache;
pub use config::CatalogSettings;
pub use errors::{LciDataError, RetryClass};
pub use provider::{default_providers, BoaviztaProvider, ProbasProvider, RuleCatalogProvider};
pub use soda4lca::Soda4LcaProvider;
