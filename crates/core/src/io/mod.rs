//! I/O for layer documents
//!
//! A layer document is a JSON file holding the layer's name, storage
//! profile, CRS, field schema and features.

mod document;

pub use document::{read_layer, write_layer, LayerDocument};
