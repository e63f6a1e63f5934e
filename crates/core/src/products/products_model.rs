use serde::{Deserialize, Serialize};

/// A manufactured product whose BOM is assessed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub version: String,
    pub functional_unit: String,
    pub lifetime_years: Option<f64>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1".to_string(),
            functional_unit: "1 unit".to_string(),
            lifetime_years: None,
        }
    }
}
