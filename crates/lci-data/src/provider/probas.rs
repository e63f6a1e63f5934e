//! ProBas provider.
//!
//! Deterministic offline stand-in for the German ProBas process database:
//! the dataset id is derived from the line's material code, else its
//! classification code.

use async_trait::async_trait;

use ecomap_core::bom::BomLine;
use ecomap_core::mapping::{CandidateProvider, LifeCycleStage, ProcessCandidate};

pub const PROVIDER_ID: &str = "ProBas";

const CODE_CONFIDENCE: f64 = 0.9;
const CLASSIFICATION_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Default, Clone)]
pub struct ProbasProvider;

impl ProbasProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CandidateProvider for ProbasProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    async fn find_candidates(&self, line: &BomLine) -> ecomap_core::Result<Vec<ProcessCandidate>> {
        let material_code = line
            .material_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let classification = line
            .classification_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let (key, confidence, rule, basis) = match (material_code, classification) {
            (Some(code), _) => (code, CODE_CONFIDENCE, "prob-material-code", "material_code"),
            (None, Some(class)) => (
                class,
                CLASSIFICATION_CONFIDENCE,
                "prob-classification",
                "classification",
            ),
            (None, None) => (
                "generic",
                CLASSIFICATION_CONFIDENCE,
                "prob-classification",
                "none",
            ),
        };

        let mut candidate = ProcessCandidate::new(
            PROVIDER_ID,
            format!("prob_{}", key),
            format!("ProBas dataset for {}", line.description),
            confidence,
            rule,
        )
        .with_description("Stub dataset - replace with ProBas lookup")
        .with_metadata("match_basis", basis);
        candidate.life_cycle_stage = Some(LifeCycleStage::RawMaterials);
        Ok(vec![candidate])
    }
}
