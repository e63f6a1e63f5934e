//! Circularity module - mass-flow Product Circularity Index (PCI) and
//! Linear Flow Index (LFI).

mod circularity_engine;
mod circularity_model;
mod circularity_service;

pub use circularity_engine::{resolve_material_parameters, CircularityEngine, MassFlowPciEngine};
pub use circularity_model::{CircularityError, PciMaterialFlows, PciMaterialInputs, PciResult};
pub use circularity_service::{CircularityService, CircularityServiceTrait};
