//! Vector analysis algorithms
//!
//! Geometric operations on vector features:
//! - Validity: detect and repair invalid geometries
//! - Union: merge many geometries into one
//! - Area: planar and ellipsoidal measurements
//! - Reproject: layer CRS to geographic coordinates

mod measurements;
mod reproject;
mod union;
mod validity;

pub use measurements::{area, ellipsoidal_area, to_hectares, SQUARE_METERS_PER_HECTARE};
pub use reproject::{to_geographic, unproject};
pub use union::union_all;
pub use validity::{is_valid, make_valid, validate, validity_issues, Validated, ValidityIssue};
