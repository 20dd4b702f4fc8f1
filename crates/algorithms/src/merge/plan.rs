//! Computing the merged feature from a selection snapshot

use geo::{Geometry, HasDimensions};
use parcelmerge_core::{AttributeValue, Feature, FeatureId, Fields, ProviderKind, CRS};
use tracing::{debug, warn};

use super::error::MergeError;
use super::fields::{coerce_number, FieldHandles};
use super::params::MergeParams;
use super::parcel::{concat_parcel_ids, preview};
use crate::vector::{area, ellipsoidal_area, to_geographic, to_hectares, union_all, validate};

/// Layer properties the computation depends on
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub fields: &'a Fields,
    pub crs: &'a CRS,
    pub provider: ProviderKind,
}

/// Area written to the area field
#[derive(Debug, Clone, PartialEq)]
pub struct AreaUpdate {
    pub field: String,
    pub square_meters: f64,
    pub hectares: f64,
}

/// The merged feature and how it was derived
#[derive(Debug, Clone)]
pub struct MergePlan {
    /// New feature, without an id
    pub feature: Feature,
    /// Feature whose attributes seeded the merged one
    pub representative: Option<FeatureId>,
    /// Concatenated parcel ids, when the layer has a parcel field
    pub parcel_ids: Option<String>,
    pub area: Option<AreaUpdate>,
    /// Input geometries that had to be repaired
    pub repaired: usize,
    /// Inputs left out of the union for lack of a usable geometry
    pub skipped: Vec<Option<FeatureId>>,
}

struct Candidate<'a> {
    feature: &'a Feature,
    original_area: f64,
    geometry: Geometry<f64>,
}

/// Compute the merged feature for `features`.
///
/// Nothing is written to the layer here.
pub fn plan_merge(
    features: &[Feature],
    handles: &FieldHandles,
    ctx: PlanContext<'_>,
    params: &MergeParams,
) -> Result<MergePlan, MergeError> {
    let mut candidates: Vec<Candidate<'_>> = Vec::with_capacity(features.len());
    let mut skipped = Vec::new();
    let mut repaired = 0;

    for feature in features {
        let id = feature_label(feature);
        let geom = match &feature.geometry {
            Some(g) if !g.is_empty() => g,
            _ => {
                warn!("Feature {} has no geometry, leaving it out of the union", id);
                skipped.push(feature.id);
                continue;
            }
        };
        match validate(geom) {
            Some(valid) => {
                if valid.was_repaired() {
                    warn!(
                        "Repaired geometry of feature {} ({})",
                        id,
                        describe_issues(&valid.issues)
                    );
                    repaired += 1;
                }
                candidates.push(Candidate {
                    feature,
                    original_area: area(geom),
                    geometry: valid.geometry,
                });
            }
            None => {
                warn!("Geometry of feature {} is invalid and could not be repaired, leaving it out", id);
                skipped.push(feature.id);
            }
        }
    }

    let required = 2;
    if candidates.len() < required {
        return Err(MergeError::InsufficientGeometries {
            valid: candidates.len(),
            required,
        });
    }

    let representative = pick_representative(&candidates).ok_or(MergeError::NoRepresentative)?;
    debug!(
        "Representative feature {} (area {:.3})",
        feature_label(representative.feature),
        representative.original_area
    );

    let geometries: Vec<Geometry<f64>> = candidates.iter().map(|c| c.geometry.clone()).collect();
    let union = union_all(&geometries);
    if union.is_empty() {
        return Err(MergeError::EmptyUnion);
    }
    let union = match validate(&union) {
        Some(valid) => {
            if valid.was_repaired() {
                warn!("Repaired union geometry ({})", describe_issues(&valid.issues));
            }
            valid.geometry
        }
        None => return Err(MergeError::UnionRepairFailed),
    };

    let mut merged = Feature::new(union);
    for field in ctx.fields.iter() {
        if handles.is_computed(&field.name) {
            continue;
        }
        if let Some(value) = representative.feature.get_property(&field.name) {
            merged.set_property(field.name.clone(), value.clone());
        }
    }

    // Every selected feature is deleted, so parcel ids of skipped ones count too
    let parcel_ids = match &handles.parcel {
        Some(handle) => {
            let joined =
                concat_parcel_ids(features.iter().filter_map(|f| f.get_property(&handle.name)));
            let bytes = joined.len();
            if ctx.provider.enforces_text_length() && handle.max_length > 0 && bytes > handle.max_length
            {
                return Err(MergeError::FieldTooLong {
                    field: handle.name.clone(),
                    limit: handle.max_length,
                    actual: bytes,
                    preview: preview(&joined, params.preview_chars),
                });
            }
            merged.set_property(handle.name.clone(), AttributeValue::String(joined.clone()));
            Some(joined)
        }
        None => None,
    };

    let area_update = match &handles.area {
        Some(handle) => {
            let geometry = merged.geometry.as_ref().ok_or(MergeError::EmptyUnion)?;
            let geographic = to_geographic(geometry, ctx.crs).map_err(|source| {
                MergeError::Measurement {
                    crs: ctx.crs.identifier(),
                    source,
                }
            })?;
            let square_meters = ellipsoidal_area(&geographic, &params.ellipsoid);
            let hectares = to_hectares(square_meters);
            debug!(
                "Ellipsoidal area {:.2} m² on {} = {} ha",
                square_meters, params.ellipsoid, hectares
            );
            merged.set_property(handle.name.clone(), coerce_number(hectares, handle.field_type));
            Some(AreaUpdate {
                field: handle.name.clone(),
                square_meters,
                hectares,
            })
        }
        None => None,
    };

    Ok(MergePlan {
        feature: merged,
        representative: representative.feature.id,
        parcel_ids,
        area: area_update,
        repaired,
        skipped,
    })
}

/// Largest original area wins; the first one in selection order on ties
fn pick_representative<'c, 'a>(candidates: &'c [Candidate<'a>]) -> Option<&'c Candidate<'a>> {
    let mut best: Option<&Candidate<'_>> = None;
    for candidate in candidates.iter().filter(|c| c.original_area.is_finite()) {
        match best {
            Some(b) if candidate.original_area <= b.original_area => {}
            _ => best = Some(candidate),
        }
    }
    best
}

fn feature_label(feature: &Feature) -> String {
    feature
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<new>".to_string())
}

fn describe_issues(issues: &[crate::vector::ValidityIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
