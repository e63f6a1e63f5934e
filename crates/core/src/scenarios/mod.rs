//! Scenarios module - circularity scenarios and material parameter tables.

mod scenarios_defaults;
mod scenarios_model;

pub use scenarios_defaults::{default_material_parameters, default_scenario, DEFAULT_SCENARIO_ID};
pub use scenarios_model::{MaterialCircularityParameters, Scenario};
