//! # parcelmerge core
//!
//! Core types, layer editing and CRS handling for parcelmerge.
//!
//! This crate provides:
//! - `Feature` / `AttributeValue`: vector records with typed attributes
//! - `Fields`: ordered, case-insensitive field schema
//! - `VectorLayer`: a layer with selection and transactional editing sessions
//! - `EditableLayer`: the seam the merge operation drives a layer through
//! - `CRS`, `Ellipsoid` and projection lookup for geodesic measurement
//! - I/O for JSON layer documents

pub mod crs;
pub mod error;
pub mod io;
pub mod layer;
pub mod vector;

pub use crs::{Ellipsoid, Projection, CRS};
pub use error::{Error, Result};
pub use layer::{Checkpoint, EditableLayer, ProviderKind, VectorLayer};
pub use vector::{AttributeValue, Feature, FeatureId, Field, FieldType, Fields};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{Ellipsoid, Projection, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::layer::{Checkpoint, EditableLayer, ProviderKind, VectorLayer};
    pub use crate::vector::{AttributeValue, Feature, FeatureId, Field, FieldType, Fields};
}
