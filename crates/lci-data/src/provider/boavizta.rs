//! Boavizta provider: keyword heuristic over the line description.

use async_trait::async_trait;

use ecomap_core::bom::BomLine;
use ecomap_core::mapping::{CandidateProvider, LifeCycleStage, ProcessCandidate};

pub const PROVIDER_ID: &str = "Boavizta";

const KEYWORD: &str = "aluminum";
const KEYWORD_CONFIDENCE: f64 = 0.8;
const BASE_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Default, Clone)]
pub struct BoaviztaProvider;

impl BoaviztaProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CandidateProvider for BoaviztaProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    async fn find_candidates(&self, line: &BomLine) -> ecomap_core::Result<Vec<ProcessCandidate>> {
        let confidence = if line.description.to_lowercase().contains(KEYWORD) {
            KEYWORD_CONFIDENCE
        } else {
            BASE_CONFIDENCE
        };

        let mut candidate = ProcessCandidate::new(
            PROVIDER_ID,
            format!("boa_{}", line.id),
            format!("Boavizta guess for {}", line.description),
            confidence,
            "boa-fuzzy-description",
        )
        .with_description("Fuzzy match placeholder")
        .with_metadata("heuristic", "description_contains_aluminum");
        candidate.life_cycle_stage = Some(LifeCycleStage::RawMaterials);
        Ok(vec![candidate])
    }
}
