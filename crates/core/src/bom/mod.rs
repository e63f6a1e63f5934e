//! Bill-of-materials module - BOM line model and CSV ingestion.

mod bom_csv;
mod bom_model;

pub use bom_csv::{load_bom_from_csv, parse_bom_csv};
pub use bom_model::BomLine;
