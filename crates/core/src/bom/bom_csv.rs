//! BOM ingestion from CSV files.
//!
//! Columns are matched by header name. `bom_item_id` (or `id`) and
//! `product_id` are required; every other column is optional. Empty cells
//! are treated as missing values.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use super::bom_model::BomLine;
use crate::errors::{Error, ValidationError};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BomCsvRow {
    bom_item_id: Option<String>,
    id: Option<String>,
    product_id: Option<String>,
    parent_bom_item_id: Option<String>,
    description: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    mass_kg: Option<String>,
    material_family: Option<String>,
    material_code: Option<String>,
    #[serde(alias = "classification_code")]
    classification_unspsc: Option<String>,
    supplier_id: Option<String>,
    component_code: Option<String>,
    recycled_content_share: Option<String>,
    reused_share: Option<String>,
    remanufactured_share: Option<String>,
    recyclability_rate: Option<String>,
    landfill_rate: Option<String>,
    incineration_rate: Option<String>,
    country_of_origin: Option<String>,
    manufacturing_location: Option<String>,
    lci_dataset_id: Option<String>,
}

/// Loads BOM lines from a CSV file on disk.
pub fn load_bom_from_csv(path: impl AsRef<Path>) -> Result<Vec<BomLine>> {
    let file = File::open(path.as_ref())?;
    parse_bom_csv(file)
}

/// Parses BOM lines from any CSV reader. Output order mirrors row order.
pub fn parse_bom_csv<R: Read>(reader: R) -> Result<Vec<BomLine>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut lines = Vec::new();
    for (index, record) in csv_reader.deserialize::<BomCsvRow>().enumerate() {
        let row = record?;
        // Header is row 1
        lines.push(row_to_line(row, index + 2)?);
    }
    Ok(lines)
}

fn row_to_line(row: BomCsvRow, row_number: usize) -> Result<BomLine> {
    let id = clean(row.bom_item_id)
        .or_else(|| clean(row.id))
        .ok_or_else(|| {
            Error::Validation(ValidationError::MissingField(format!(
                "bom_item_id/id (row {})",
                row_number
            )))
        })?;
    let product_id = clean(row.product_id).ok_or_else(|| {
        Error::Validation(ValidationError::MissingField(format!(
            "product_id (row {})",
            row_number
        )))
    })?;

    Ok(BomLine {
        id,
        product_id,
        parent_bom_item_id: clean(row.parent_bom_item_id),
        description: clean(row.description).unwrap_or_default(),
        quantity: parse_float(row.quantity, "quantity", row_number)?.unwrap_or(1.0),
        unit: clean(row.unit),
        mass_kg: parse_float(row.mass_kg, "mass_kg", row_number)?.unwrap_or(0.0),
        material_family: clean(row.material_family),
        material_code: clean(row.material_code),
        classification_code: clean(row.classification_unspsc),
        supplier_id: clean(row.supplier_id),
        component_code: clean(row.component_code),
        recycled_content_share: parse_float(
            row.recycled_content_share,
            "recycled_content_share",
            row_number,
        )?,
        reused_share: parse_float(row.reused_share, "reused_share", row_number)?,
        remanufactured_share: parse_float(
            row.remanufactured_share,
            "remanufactured_share",
            row_number,
        )?,
        recyclability_rate: parse_float(row.recyclability_rate, "recyclability_rate", row_number)?,
        landfill_rate: parse_float(row.landfill_rate, "landfill_rate", row_number)?,
        incineration_rate: parse_float(row.incineration_rate, "incineration_rate", row_number)?,
        country_of_origin: clean(row.country_of_origin),
        manufacturing_location: clean(row.manufacturing_location),
        lci_dataset_id: clean(row.lci_dataset_id),
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_float(value: Option<String>, column: &str, row_number: usize) -> Result<Option<f64>> {
    match clean(value) {
        None => Ok(None),
        Some(raw) => raw.parse::<f64>().map(Some).map_err(|e| {
            Error::Validation(ValidationError::InvalidInput(format!(
                "Column '{}' on row {} is not a number ('{}'): {}",
                column, row_number, raw, e
            )))
        }),
    }
}
