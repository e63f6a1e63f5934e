use ecomap_core::errors::Result;

use super::model::NewMappingRuleDB;

const SEED_RULES: &str = include_str!("seed_rules.json");

/// Built-in rule set inserted at startup.
pub fn default_seed_rules() -> Result<Vec<NewMappingRuleDB>> {
    Ok(serde_json::from_str(SEED_RULES)?)
}
