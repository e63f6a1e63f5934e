//! Candidate providers queried by the fuzzy tier.

mod boavizta;
mod probas;
mod rules;

use std::sync::Arc;

use ecomap_core::mapping::{CandidateProvider, MappingRuleRepositoryTrait};

pub use boavizta::BoaviztaProvider;
pub use probas::ProbasProvider;
pub use rules::RuleCatalogProvider;

use crate::soda4lca::Soda4LcaProvider;

/// Provider list in query order: ProBas, Boavizta, the rule catalog, then
/// the remote soda4LCA node when one is configured.
pub fn default_providers(
    rules: Arc<dyn MappingRuleRepositoryTrait>,
    catalog: Option<Arc<Soda4LcaProvider>>,
) -> Vec<Arc<dyn CandidateProvider>> {
    let mut providers: Vec<Arc<dyn CandidateProvider>> = vec![
        Arc::new(ProbasProvider::new()),
        Arc::new(BoaviztaProvider::new()),
        Arc::new(RuleCatalogProvider::new(rules)),
    ];
    if let Some(catalog) = catalog {
        providers.push(catalog);
    }
    providers
}
