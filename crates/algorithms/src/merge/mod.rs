//! Merge selected features with parcel id concatenation
//!
//! [`merge_selected`] replaces the selected features of a layer with one
//! feature whose geometry is their union. The parcel identifier field gets
//! the sorted set of all parcel ids, the area field the ellipsoidal area in
//! hectares, and every other attribute is taken from the input with the
//! largest area.
//!
//! The change runs inside an editing session held by an [`EditGuard`]: it
//! is committed as a whole or rolled back. When the layer already had a
//! session open, the changes are left pending in it, and a failure only
//! undoes what the merge itself did.

mod error;
mod fields;
mod params;
mod parcel;
mod plan;
mod session;

pub use error::{
    ErrorCategory, MergeError, MergeFailure, PersistStage, RollbackScope, FILE_BACKEND_ADVICE,
};
pub use fields::{FieldHandle, FieldHandles};
pub use params::MergeParams;
pub use parcel::{concat_parcel_ids, parcel_tokens, PARCEL_SEPARATOR};
pub use plan::{plan_merge, AreaUpdate, MergePlan, PlanContext};
pub use session::{EditGuard, SessionOutcome};

use parcelmerge_core::{EditableLayer, Feature, FeatureId};
use tracing::{error, info};

use crate::interface::{Interface, Notice, NoticeLevel};
use error::{backend_advice, format_ids};

/// Title of the notifications shown by the merge
pub const MERGE_TITLE: &str = "Merge with concatenation";

/// Result of a successful merge
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub layer: String,
    /// Number of features replaced
    pub merged_count: usize,
    pub merged_ids: Vec<FeatureId>,
    pub new_feature_id: FeatureId,
    pub representative: Option<FeatureId>,
    pub parcel_ids: Option<String>,
    pub area: Option<AreaUpdate>,
    pub repaired_geometries: usize,
    /// Inputs deleted without contributing a geometry
    pub skipped: usize,
    pub session: SessionOutcome,
}

impl MergeReport {
    /// One-line message for the user
    pub fn summary(&self) -> String {
        let mut msg = format!(
            "Merged {} features into feature {}.",
            self.merged_count, self.new_feature_id
        );
        if self.session == SessionOutcome::LeftOpen {
            msg.push_str(" The changes are pending in the open editing session; save the layer edits to keep them.");
        }
        msg
    }
}

/// Merge the selected features of `layer` into one.
///
/// `None` stands for "no active vector layer". Every outcome is reported
/// through `iface`; on success the layer is repainted and the map refreshed.
pub fn merge_selected<L>(
    layer: Option<&mut L>,
    iface: &mut dyn Interface,
    params: &MergeParams,
) -> Result<MergeReport, MergeFailure>
where
    L: EditableLayer + ?Sized,
{
    match run(layer, params) {
        Ok(report) => {
            info!(
                "Merged features [{}] of '{}' into {}",
                format_ids(&report.merged_ids),
                report.layer,
                report.new_feature_id
            );
            iface.refresh_map();
            iface.notify(Notice::new(NoticeLevel::Info, MERGE_TITLE, report.summary()));
            Ok(report)
        }
        Err(failure) => {
            error!("Merge failed: {}", failure.error.detail());
            if let Some(scope) = &failure.rollback {
                error!("{}", scope);
            }
            iface.notify(Notice::new(
                failure.error.level(),
                MERGE_TITLE,
                failure.user_message(),
            ));
            Err(failure)
        }
    }
}

fn run<L>(layer: Option<&mut L>, params: &MergeParams) -> Result<MergeReport, MergeFailure>
where
    L: EditableLayer + ?Sized,
{
    let layer = layer.ok_or(MergeError::NoActiveLayer)?;

    let selected = layer.selected_ids();
    let required = params.required_features();
    if selected.len() < required {
        return Err(MergeError::TooFewSelected {
            selected: selected.len(),
            required,
        }
        .into());
    }
    if layer.provider().is_transient() {
        return Err(MergeError::TemporaryLayer {
            layer: layer.name().to_string(),
        }
        .into());
    }
    let handles = FieldHandles::resolve(layer.fields(), params)?;
    let snapshot = layer.selected_features();
    let layer_name = layer.name().to_string();

    info!(
        "Merging {} features of '{}' ({})",
        selected.len(),
        layer_name,
        layer.crs()
    );

    let mut guard = EditGuard::acquire(&mut *layer)?;
    let (plan, new_feature_id) = match apply(&mut guard, &snapshot, &selected, &handles, params) {
        Ok(applied) => applied,
        Err(err) => {
            let scope = guard.rollback();
            return Err(MergeFailure::new(err, Some(scope)));
        }
    };
    let session = guard
        .finish()
        .map_err(|(err, scope)| MergeFailure::new(err, Some(scope)))?;

    layer.trigger_repaint();

    Ok(MergeReport {
        layer: layer_name,
        merged_count: selected.len(),
        merged_ids: selected,
        new_feature_id,
        representative: plan.representative,
        parcel_ids: plan.parcel_ids,
        area: plan.area,
        repaired_geometries: plan.repaired,
        skipped: plan.skipped.len(),
        session,
    })
}

/// Compute the merged feature, add it, then delete the originals
fn apply<L>(
    guard: &mut EditGuard<'_, L>,
    snapshot: &[Feature],
    selected: &[FeatureId],
    handles: &FieldHandles,
    params: &MergeParams,
) -> Result<(MergePlan, FeatureId), MergeError>
where
    L: EditableLayer + ?Sized,
{
    let layer = guard.layer();
    let advice = backend_advice(layer.provider());
    let plan = plan_merge(
        snapshot,
        handles,
        PlanContext {
            fields: layer.fields(),
            crs: layer.crs(),
            provider: layer.provider(),
        },
        params,
    )?;

    let new_id = layer
        .add_feature(plan.feature.clone())
        .map_err(|source| MergeError::Persistence {
            stage: PersistStage::AddFeature,
            source,
            advice,
        })?;
    layer
        .delete_features(selected)
        .map_err(|source| MergeError::Persistence {
            stage: PersistStage::DeleteFeatures,
            source,
            advice,
        })?;
    Ok((plan, new_id))
}
