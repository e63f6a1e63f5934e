//! Products module - the owner of a bill of materials.

mod products_model;

pub use products_model::Product;
