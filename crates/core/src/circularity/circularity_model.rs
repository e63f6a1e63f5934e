//! PCI domain models. Results are computed per request and never persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clamped inputs for one BOM line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PciMaterialInputs {
    pub material_key: String,
    pub mass: f64,
    pub reused_share: f64,
    pub recycled_content_share: f64,
    pub efficiency_feedstock_production: f64,
    pub efficiency_component_production: f64,
    pub recovered_fraction_feedstock_losses: f64,
    pub recovered_fraction_component_losses: f64,
    pub efficiency_material_separation_eol: f64,
    pub efficiency_recycled_feedstock_production: f64,
    pub collection_fraction_for_reuse: f64,
    pub collection_fraction_for_recycling: f64,
}

impl PciMaterialInputs {
    /// Same material with no reuse, recycled content or collection.
    pub fn linear_baseline(&self) -> Self {
        Self {
            reused_share: 0.0,
            recycled_content_share: 0.0,
            collection_fraction_for_reuse: 0.0,
            collection_fraction_for_recycling: 0.0,
            ..self.clone()
        }
    }
}

/// Mass flows (kg) of one material slice.
///
/// `v` is virgin feedstock, `w_*` are unrecoverable waste streams (feedstock
/// production, component production, use phase, end-of-life separation,
/// recycled feedstock production), `r_*` are recycled streams and `c_net` is
/// the net component reuse balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PciMaterialFlows {
    pub material_key: String,
    pub mass: f64,
    pub reused_share: f64,
    pub recycled_content_share: f64,
    pub v: f64,
    pub w_fp: f64,
    pub w_cp: f64,
    pub w_u: f64,
    pub w_ms: f64,
    pub w_rfp: f64,
    pub w_total: f64,
    pub r_in: f64,
    pub r_fp: f64,
    pub r_cp: f64,
    pub r_eol: f64,
    pub r_out: f64,
    pub r_net: f64,
    pub c_net: f64,
    pub v_linear: f64,
    pub w_linear: f64,
    pub lfi_material: f64,
    pub pci_material: f64,
}

/// Aggregate circularity result for a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PciResult {
    pub product_id: String,
    pub scenario_id: String,
    /// Mass-weighted average of the material PCIs.
    pub pci_product: f64,
    pub utility_factor: f64,
    /// Computed from aggregate flows; diagnostic only.
    pub lfi_product: f64,
    pub mass_total: f64,
    pub per_material_flows: Vec<PciMaterialFlows>,
    pub notes: Vec<String>,
}

#[derive(Error, Debug)]
pub enum CircularityError {
    #[error("Missing material parameters for {material}")]
    MissingMaterialParameters { material: String },

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
}
