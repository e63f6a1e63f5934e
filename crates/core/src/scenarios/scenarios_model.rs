//! Scenario domain models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Efficiency coefficients for one material family or code. All values are
/// fractions in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialCircularityParameters {
    pub material_key: String,
    pub efficiency_feedstock_production: f64,
    pub efficiency_component_production: f64,
    pub recovered_fraction_feedstock_losses: f64,
    pub recovered_fraction_component_losses: f64,
    pub efficiency_material_separation_eol: f64,
    pub efficiency_recycled_feedstock_production: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A calculation scenario for circularity runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub collection_fraction_for_reuse: f64,
    pub collection_fraction_for_recycling: f64,
    #[serde(default)]
    pub utility_factor: Option<f64>,
    #[serde(default)]
    pub design_lifetime_functional_units: Option<f64>,
    #[serde(default)]
    pub actual_used_functional_units: Option<f64>,
    /// Keyed by material code or material family.
    #[serde(default)]
    pub material_parameters: BTreeMap<String, MaterialCircularityParameters>,
    #[serde(default)]
    pub default_material_parameters: Option<MaterialCircularityParameters>,
}

const UTILITY_EPS: f64 = 1e-9;

impl Scenario {
    /// Creates a scenario with no collection, utility factor 1 and an empty
    /// parameter table.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            collection_fraction_for_reuse: 0.0,
            collection_fraction_for_recycling: 0.0,
            utility_factor: None,
            design_lifetime_functional_units: None,
            actual_used_functional_units: None,
            material_parameters: BTreeMap::new(),
            default_material_parameters: None,
        }
    }

    /// Explicit positive utility factor, else actual / design functional
    /// units, else 1.0.
    pub fn compute_utility_factor(&self) -> f64 {
        if let Some(uf) = self.utility_factor.filter(|uf| *uf > 0.0) {
            return uf;
        }
        match (
            self.design_lifetime_functional_units,
            self.actual_used_functional_units,
        ) {
            (Some(design), Some(actual)) => actual / design.max(UTILITY_EPS),
            _ => 1.0,
        }
    }

    pub fn with_parameters(mut self, params: MaterialCircularityParameters) -> Self {
        self.material_parameters
            .insert(params.material_key.clone(), params);
        self
    }
}
