//! Exposes the seeded rule set to the fuzzy tier, so a line that misses
//! every deterministic rule can still land on a rule dataset by name.

use std::sync::Arc;

use async_trait::async_trait;

use ecomap_core::bom::BomLine;
use ecomap_core::mapping::{
    candidate_from_rule, CandidateProvider, MappingRuleRepositoryTrait, ProcessCandidate,
};

pub const PROVIDER_ID: &str = "rule-catalog";

pub struct RuleCatalogProvider {
    rules: Arc<dyn MappingRuleRepositoryTrait>,
}

impl RuleCatalogProvider {
    pub fn new(rules: Arc<dyn MappingRuleRepositoryTrait>) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl CandidateProvider for RuleCatalogProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    /// Every rule as a zero-heuristic candidate; similarity decides.
    async fn find_candidates(&self, _line: &BomLine) -> ecomap_core::Result<Vec<ProcessCandidate>> {
        Ok(self
            .rules
            .list_rules()?
            .iter()
            .map(|rule| {
                let mut candidate = candidate_from_rule(rule);
                candidate.confidence_score = 0.0;
                candidate.name = rule.name.clone();
                candidate
            })
            .collect())
    }
}
