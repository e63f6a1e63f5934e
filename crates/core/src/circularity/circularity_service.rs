use std::sync::Arc;

use log::info;

use super::circularity_engine::{CircularityEngine, MassFlowPciEngine};
use super::circularity_model::PciResult;
use crate::bom::BomLine;
use crate::errors::Result;
use crate::products::Product;
use crate::scenarios::Scenario;

/// Trait for circularity service operations
pub trait CircularityServiceTrait: Send + Sync {
    fn calculate_pci(
        &self,
        product: &Product,
        lines: &[BomLine],
        scenario: &Scenario,
    ) -> Result<PciResult>;
}

/// Delegates to a pluggable [`CircularityEngine`].
pub struct CircularityService {
    engine: Arc<dyn CircularityEngine>,
}

impl CircularityService {
    pub fn new(engine: Arc<dyn CircularityEngine>) -> Self {
        CircularityService { engine }
    }
}

impl Default for CircularityService {
    fn default() -> Self {
        Self::new(Arc::new(MassFlowPciEngine::new()))
    }
}

impl CircularityServiceTrait for CircularityService {
    fn calculate_pci(
        &self,
        product: &Product,
        lines: &[BomLine],
        scenario: &Scenario,
    ) -> Result<PciResult> {
        let result = self.engine.calculate_pci(product, lines, scenario)?;
        info!(
            "Product {} scored PCI {:.3} under scenario '{}'",
            product.id, result.pci_product, scenario.name
        );
        Ok(result)
    }
}
