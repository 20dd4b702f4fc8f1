//! Merge configuration

use parcelmerge_core::Ellipsoid;
use serde::{Deserialize, Serialize};

/// Parameters for merging selected features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    /// Parcel identifier field, matched case-insensitively (default: `nr_dzialki`)
    pub parcel_field: String,
    /// Recognised area field names in lowercase. The last schema field
    /// whose name is in this list receives the area in hectares.
    pub area_fields: Vec<String>,
    /// Reference ellipsoid for the area measurement (default: WGS84)
    pub ellipsoid: Ellipsoid,
    /// Minimum number of selected features (default: 2)
    pub min_features: usize,
    /// Characters of an over-long value shown in error messages
    pub preview_chars: usize,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            parcel_field: "nr_dzialki".to_string(),
            area_fields: ["powierzchnia", "pole", "area", "pow"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ellipsoid: Ellipsoid::WGS84,
            min_features: 2,
            preview_chars: 50,
        }
    }
}

impl MergeParams {
    pub fn with_ellipsoid(mut self, ellipsoid: Ellipsoid) -> Self {
        self.ellipsoid = ellipsoid;
        self
    }

    /// Whether `name` is one of the recognised area field names
    pub fn is_area_field(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.area_fields.iter().any(|f| f.to_lowercase() == name)
    }

    /// Minimum selection size, never below two
    pub(crate) fn required_features(&self) -> usize {
        self.min_features.max(2)
    }
}
