use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use ecomap_core::circularity::{CircularityService, CircularityServiceTrait};
use ecomap_core::mapping::{MappingService, MappingServiceTrait, MappingSettings};
use ecomap_lci::{default_providers, DatasetCache, Soda4LcaProvider};
use ecomap_storage_sqlite::{
    db::{self, spawn_writer},
    MappingDecisionRepository, MappingRuleRepository,
};

use crate::config::Config;

pub struct AppState {
    pub mapping_service: Arc<dyn MappingServiceTrait>,
    pub circularity_service: Arc<dyn CircularityServiceTrait>,
}

/// Logs go to stderr; stdout carries the command's JSON output.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let settings = MappingSettings::new(config.min_candidate, config.min_auto)?;

    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());

    let rule_repository = Arc::new(MappingRuleRepository::new(pool.clone(), writer.clone()));
    rule_repository.seed_defaults().await?;
    let decision_repository = Arc::new(MappingDecisionRepository::new(pool.clone(), writer));

    // The remote catalog and dataset cache are only wired up when a
    // soda4LCA node is configured.
    let catalog = match config.catalog.configured_base_url() {
        Some(base_url) => {
            tracing::info!("Using soda4LCA node at {}", base_url);
            Some(Arc::new(Soda4LcaProvider::new(config.catalog.clone())?))
        }
        None => None,
    };

    let providers = default_providers(rule_repository.clone(), catalog.clone());
    let mut mapping_service =
        MappingService::new(providers, rule_repository, decision_repository, settings);
    if let Some(catalog) = catalog {
        mapping_service = mapping_service
            .with_catalog(catalog)
            .with_dataset_cache(Arc::new(DatasetCache::new(config.catalog.clone())?));
    }

    Ok(AppState {
        mapping_service: Arc::new(mapping_service),
        circularity_service: Arc::new(CircularityService::default()),
    })
}
