//! Domain layer types and invariants.

pub mod barcode;
pub mod energy;
pub mod error;
pub mod product;
