//! Built-in reference scenario and material parameter table.

use std::collections::BTreeMap;

use super::scenarios_model::{MaterialCircularityParameters, Scenario};

pub const DEFAULT_SCENARIO_ID: &str = "default";

fn params(key: &str, values: [f64; 6]) -> MaterialCircularityParameters {
    MaterialCircularityParameters {
        material_key: key.to_string(),
        efficiency_feedstock_production: values[0],
        efficiency_component_production: values[1],
        recovered_fraction_feedstock_losses: values[2],
        recovered_fraction_component_losses: values[3],
        efficiency_material_separation_eol: values[4],
        efficiency_recycled_feedstock_production: values[5],
        notes: None,
    }
}

/// Parameter table keyed by material family and by the material codes used
/// in the seeded mapping rules.
pub fn default_material_parameters() -> BTreeMap<String, MaterialCircularityParameters> {
    const ALUMINUM: [f64; 6] = [0.85, 0.9, 0.6, 0.6, 0.85, 0.9];
    const STEEL: [f64; 6] = [0.88, 0.93, 0.7, 0.7, 0.9, 0.93];
    const POLYMER: [f64; 6] = [0.8, 0.9, 0.4, 0.5, 0.7, 0.65];
    const ELECTRONICS: [f64; 6] = [0.75, 0.85, 0.5, 0.4, 0.6, 0.5];
    const COPPER: [f64; 6] = [0.9, 0.92, 0.75, 0.75, 0.9, 0.95];

    [
        ("Aluminum", params("Aluminum", ALUMINUM)),
        ("Steel", params("Steel", STEEL)),
        ("Polymer", params("Polymer", POLYMER)),
        ("Electronics", params("Electronics", ELECTRONICS)),
        ("ALU-6000", params("Aluminum", ALUMINUM)),
        ("STL-FASTENER", params("Steel", STEEL)),
        ("ABS-HOUSING", params("Polymer", POLYMER)),
        ("CU-WIRE", params("Copper", COPPER)),
    ]
    .into_iter()
    .map(|(key, p)| (key.to_string(), p))
    .collect()
}

/// The "EU Reference" scenario.
pub fn default_scenario() -> Scenario {
    Scenario {
        id: DEFAULT_SCENARIO_ID.to_string(),
        name: "EU Reference".to_string(),
        collection_fraction_for_reuse: 0.15,
        collection_fraction_for_recycling: 0.7,
        utility_factor: Some(0.9),
        design_lifetime_functional_units: None,
        actual_used_functional_units: None,
        material_parameters: default_material_parameters(),
        default_material_parameters: None,
    }
}
