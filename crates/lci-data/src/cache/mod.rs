//! Local filesystem cache of datasets fetched from the remote catalog.

mod dataset_cache;

pub use dataset_cache::{sanitize_path_component, DatasetCache, CACHE_FILE_SUFFIX};
