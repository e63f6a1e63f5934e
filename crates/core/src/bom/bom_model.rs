//! BOM domain models.

use serde::{Deserialize, Serialize};

/// A single BOM line enriched with circularity and mapping attributes.
///
/// Lines are immutable once uploaded; a new upload replaces the product's
/// whole BOM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    pub id: String,
    pub product_id: String,
    pub parent_bom_item_id: Option<String>,
    pub description: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub mass_kg: f64,
    pub material_family: Option<String>,
    pub material_code: Option<String>,
    pub classification_code: Option<String>,
    pub supplier_id: Option<String>,
    pub component_code: Option<String>,
    pub recycled_content_share: Option<f64>,
    pub reused_share: Option<f64>,
    pub remanufactured_share: Option<f64>,
    pub recyclability_rate: Option<f64>,
    pub landfill_rate: Option<f64>,
    pub incineration_rate: Option<f64>,
    pub country_of_origin: Option<String>,
    pub manufacturing_location: Option<String>,
    /// Dataset identifier assigned upstream (e.g. `soda4lca:<uuid>`).
    pub lci_dataset_id: Option<String>,
}

impl BomLine {
    /// Creates a line with quantity 1 and every optional attribute unset.
    pub fn new(
        id: impl Into<String>,
        product_id: impl Into<String>,
        description: impl Into<String>,
        mass_kg: f64,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            description: description.into(),
            quantity: 1.0,
            mass_kg,
            ..Default::default()
        }
    }

    /// Mass of the line across its quantity.
    pub fn total_mass(&self) -> f64 {
        self.mass_kg * self.quantity
    }

    /// Key used for circularity parameter lookups and reporting:
    /// material code, then family, then the line id.
    pub fn material_key(&self) -> &str {
        non_empty(&self.material_code)
            .or_else(|| non_empty(&self.material_family))
            .unwrap_or(&self.id)
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_mass_uses_quantity() {
        let mut line = BomLine::new("l1", "p1", "Bracket", 0.25);
        line.quantity = 4.0;
        assert!((line.total_mass() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_material_key_precedence() {
        let mut line = BomLine::new("l1", "p1", "Bracket", 1.0);
        assert_eq!(line.material_key(), "l1");

        line.material_family = Some("Steel".to_string());
        assert_eq!(line.material_key(), "Steel");

        line.material_code = Some("STL-FASTENER".to_string());
        assert_eq!(line.material_key(), "STL-FASTENER");

        line.material_code = Some("  ".to_string());
        assert_eq!(line.material_key(), "Steel");
    }
}
