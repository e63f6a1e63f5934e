//! Ecomap Core - Domain entities, services, and traits.
//!
//! This crate contains the BOM resolution pipeline (BOM line -> LCI process
//! dataset) and the mass-flow circularity calculator. It is database-agnostic
//! and defines traits that are implemented by the `storage-sqlite` crate
//! (rule and decision stores) and the `lci-data` crate (candidate providers,
//! remote catalog, dataset cache).

pub mod bom;
pub mod circularity;
pub mod errors;
pub mod mapping;
pub mod products;
pub mod scenarios;

// Re-export error types
pub use errors::{Error, StatusKind};
pub use errors::Result;
