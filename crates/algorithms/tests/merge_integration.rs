//! End-to-end tests of the merge operation on layers backed by layer
//! documents in a temporary directory.

use std::path::Path;

use geo::{polygon, Area, Geometry, LineString, Polygon};
use parcelmerge_algorithms::interface::{NoticeLevel, NoticeLog};
use parcelmerge_algorithms::merge::{
    merge_selected, MergeError, MergeParams, PersistStage, RollbackScope, SessionOutcome,
};
use parcelmerge_core::{
    AttributeValue, Checkpoint, EditableLayer, Error, Feature, FeatureId, Field, FieldType,
    Fields, ProviderKind, Result, VectorLayer, CRS,
};
use proptest::prelude::*;
use tempfile::TempDir;

// ── Fixtures ──────────────────────────────────────────────────────────

fn schema(parcel_len: usize) -> Fields {
    Fields::new(vec![
        Field::text("nr_dzialki", parcel_len),
        Field::new("powierzchnia", FieldType::Real),
        Field::text("obreb", 30),
    ])
    .unwrap()
}

fn rect(x0: f64, y0: f64, w: f64, h: f64) -> Geometry<f64> {
    Geometry::Polygon(polygon![
        (x: x0, y: y0),
        (x: x0 + w, y: y0),
        (x: x0 + w, y: y0 + h),
        (x: x0, y: y0 + h),
    ])
}

fn parcel(geom: Geometry<f64>, nr: &str, obreb: &str) -> Feature {
    Feature::new(geom)
        .with_property("nr_dzialki", nr)
        .with_property("obreb", obreb)
}

/// Four CS92 parcels in a row, 50 m wide and 150 m tall, sharing edges
fn cs92_layer(provider: ProviderKind, parcel_len: usize) -> VectorLayer {
    let mut layer = VectorLayer::new("dzialki", provider, CRS::poland_cs92(), schema(parcel_len));
    let parcels = [("5", "Rudna"), ("5,6", "Lipa"), ("7", "Rudna"), ("8", "Rudna")];
    for (i, (nr, obreb)) in parcels.iter().enumerate() {
        let x0 = 500_000.0 + 50.0 * i as f64;
        layer
            .insert_committed(parcel(rect(x0, 480_000.0, 50.0, 150.0), nr, obreb))
            .unwrap();
    }
    layer
}

fn saved_layer(dir: &Path, provider: ProviderKind, parcel_len: usize) -> VectorLayer {
    let mut layer = cs92_layer(provider, parcel_len);
    layer.save_as(dir.join("dzialki.json")).unwrap();
    layer
}

fn features_of(layer: &VectorLayer) -> Vec<Feature> {
    layer
        .feature_ids()
        .into_iter()
        .filter_map(|id| layer.feature(id))
        .collect()
}

fn ids(raw: &[u64]) -> Vec<FeatureId> {
    raw.iter().copied().map(FeatureId).collect()
}

// ── Success ───────────────────────────────────────────────────────────

#[test]
fn merge_replaces_selection_with_one_feature() {
    let dir = TempDir::new().unwrap();
    let mut layer = saved_layer(dir.path(), ProviderKind::FlatFile, 254);
    layer.select(&ids(&[1, 2, 3]));
    let mut iface = NoticeLog::new();

    let report = merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap();

    assert_eq!(report.merged_count, 3);
    assert_eq!(report.new_feature_id, FeatureId(5));
    assert_eq!(report.session, SessionOutcome::Committed);
    assert_eq!(layer.feature_count(), 4 - 3 + 1);
    for id in ids(&[1, 2, 3]) {
        assert!(layer.feature(id).is_none(), "feature {id} still present");
    }
    assert!(!layer.is_editable());

    let merged = layer.feature(FeatureId(5)).unwrap();
    assert_eq!(merged.attribute("nr_dzialki"), AttributeValue::from("5,6,7"));
    assert_eq!(merged.attribute("obreb"), AttributeValue::from("Rudna"));
    let union = merged.geometry.as_ref().unwrap();
    assert!((union.unsigned_area() - 22_500.0).abs() < 1e-6);

    // Committed to disk
    let reopened = VectorLayer::open(dir.path().join("dzialki.json")).unwrap();
    assert_eq!(reopened.feature_ids(), ids(&[4, 5]));

    assert_eq!(layer.repaint_requests(), 1);
    assert_eq!(iface.refreshes, 1);
    let notice = iface.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert!(notice.message.contains("Merged 3 features"));
}

#[test]
fn overlapping_parcel_ids_are_merged() {
    let dir = TempDir::new().unwrap();
    let mut layer = saved_layer(dir.path(), ProviderKind::Database, 0);
    layer.select(&ids(&[1, 2]));

    let report =
        merge_selected(Some(&mut layer), &mut NoticeLog::new(), &MergeParams::default()).unwrap();

    assert_eq!(report.parcel_ids.as_deref(), Some("5,6"));
    // Both inputs have the same area, the first selected seeds the attributes
    assert_eq!(report.representative, Some(FeatureId(1)));
}

#[test]
fn area_is_stored_in_hectares() {
    // 100 m x 150 m on the CS92 grid near its central meridian
    let dir = TempDir::new().unwrap();
    let mut layer = saved_layer(dir.path(), ProviderKind::Database, 0);
    layer.select(&ids(&[1, 2]));

    let report =
        merge_selected(Some(&mut layer), &mut NoticeLog::new(), &MergeParams::default()).unwrap();

    let area = report.area.unwrap();
    assert_eq!(area.field, "powierzchnia");
    assert!((area.square_meters - 15_021.0).abs() < 5.0, "{}", area.square_meters);
    assert_eq!(area.hectares, 1.5);
    let merged = layer.feature(report.new_feature_id).unwrap();
    assert_eq!(merged.attribute("powierzchnia"), AttributeValue::Float(1.5));
}

#[test]
fn merge_into_open_session_leaves_it_pending() {
    let dir = TempDir::new().unwrap();
    let mut layer = saved_layer(dir.path(), ProviderKind::Database, 0);
    layer.start_editing().unwrap();
    layer.select(&ids(&[3, 4]));
    let mut iface = NoticeLog::new();

    let report = merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap();

    assert_eq!(report.session, SessionOutcome::LeftOpen);
    assert!(layer.is_editable());
    assert!(layer.is_modified());
    assert_eq!(layer.feature_ids(), ids(&[1, 2, 5]));
    assert_eq!(layer.committed_features().count(), 4);
    assert!(iface.last().unwrap().message.contains("pending"));

    layer.commit_changes().unwrap();
    let reopened = VectorLayer::open(dir.path().join("dzialki.json")).unwrap();
    assert_eq!(reopened.feature_ids(), ids(&[1, 2, 5]));
}

// ── Preconditions ─────────────────────────────────────────────────────

#[test]
fn no_active_layer() {
    let mut iface = NoticeLog::new();
    let failure =
        merge_selected::<VectorLayer>(None, &mut iface, &MergeParams::default()).unwrap_err();
    assert!(matches!(failure.error, MergeError::NoActiveLayer));
    assert!(failure.rollback.is_none());
    assert_eq!(iface.last().unwrap().level, NoticeLevel::Warning);
    assert_eq!(iface.refreshes, 0);
}

#[test]
fn single_selection_is_rejected() {
    let mut layer = cs92_layer(ProviderKind::Database, 0);
    layer.select(&ids(&[2]));
    let failure =
        merge_selected(Some(&mut layer), &mut NoticeLog::new(), &MergeParams::default())
            .unwrap_err();
    assert!(matches!(
        failure.error,
        MergeError::TooFewSelected { selected: 1, required: 2 }
    ));
    assert!(!layer.is_editable());
    assert_eq!(layer.feature_count(), 4);
}

#[test]
fn temporary_layer_is_rejected() {
    let mut layer = cs92_layer(ProviderKind::Memory, 0);
    layer.select_all();
    let mut iface = NoticeLog::new();
    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();
    assert!(matches!(failure.error, MergeError::TemporaryLayer { .. }));
    assert!(iface.last().unwrap().message.contains("export"));
    assert!(!layer.is_editable());
}

#[test]
fn read_only_layer_cannot_be_edited() {
    let mut layer = cs92_layer(ProviderKind::Database, 0);
    layer.set_read_only(true);
    layer.select_all();
    let mut iface = NoticeLog::new();
    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();
    assert!(matches!(failure.error, MergeError::SessionUnavailable { .. }));
    assert!(failure.rollback.is_none());
    assert_eq!(iface.last().unwrap().level, NoticeLevel::Critical);
    assert_eq!(layer.feature_count(), 4);
}

// ── Failures roll back ────────────────────────────────────────────────

#[test]
fn too_long_parcel_ids_delete_nothing() {
    let dir = TempDir::new().unwrap();
    let mut layer = saved_layer(dir.path(), ProviderKind::FlatFile, 4);
    layer.select_all();
    let before = features_of(&layer);
    let on_disk = std::fs::read_to_string(dir.path().join("dzialki.json")).unwrap();
    let mut iface = NoticeLog::new();

    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();

    match &failure.error {
        MergeError::FieldTooLong { field, limit, actual, .. } => {
            assert_eq!(field, "nr_dzialki");
            assert_eq!(*limit, 4);
            assert_eq!(*actual, "5,6,7,8".len());
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(failure.rollback, Some(RollbackScope::WholeSession));
    assert_eq!(features_of(&layer), before);
    assert!(!layer.is_editable());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("dzialki.json")).unwrap(),
        on_disk
    );
    assert!(iface.last().unwrap().message.contains("Select fewer features"));
}

#[test]
fn unmeasurable_inputs_have_no_representative() {
    let mut layer = VectorLayer::new("dzialki", ProviderKind::Database, CRS::wgs84(), schema(254));
    for (i, nr) in ["11", "12"].iter().enumerate() {
        let x0 = 19.0 + 0.001 * i as f64;
        let ring = LineString::from(vec![
            (x0, 52.0),
            (x0 + 0.001, 52.0),
            (f64::NAN, 52.0005),
            (x0 + 0.001, 52.001),
            (x0, 52.001),
            (x0, 52.0),
        ]);
        layer
            .insert_committed(parcel(Geometry::Polygon(Polygon::new(ring, vec![])), nr, "Rudna"))
            .unwrap();
    }
    layer.select_all();
    let mut iface = NoticeLog::new();

    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();

    assert!(matches!(failure.error, MergeError::NoRepresentative));
    assert_eq!(failure.rollback, Some(RollbackScope::WholeSession));
    assert!(!layer.is_editable());
    assert_eq!(layer.feature_ids(), ids(&[1, 2]));
    let parcels: Vec<AttributeValue> = features_of(&layer)
        .iter()
        .map(|f| f.attribute("nr_dzialki"))
        .collect();
    assert_eq!(parcels, vec![AttributeValue::from("11"), AttributeValue::from("12")]);
    assert_eq!(iface.last().unwrap().level, NoticeLevel::Critical);
}

#[test]
fn failure_in_open_session_undoes_only_the_merge() {
    let mut layer = cs92_layer(ProviderKind::FlatFile, 4);
    layer.start_editing().unwrap();
    layer.delete_features(&ids(&[4])).unwrap();
    layer.select(&ids(&[1, 2, 3]));
    let mut iface = NoticeLog::new();

    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();

    assert!(matches!(failure.error, MergeError::FieldTooLong { .. }));
    assert_eq!(failure.rollback, Some(RollbackScope::OperationOnly));
    assert!(layer.is_editable());
    assert_eq!(layer.feature_ids(), ids(&[1, 2, 3]));
    assert!(iface.last().unwrap().message.contains("earlier edits"));
}

#[test]
fn commit_failure_is_rolled_back() {
    let dir = TempDir::new().unwrap();
    let mut layer = saved_layer(dir.path(), ProviderKind::FlatFile, 254);
    layer.select(&ids(&[1, 2]));
    let before = features_of(&layer);
    dir.close().unwrap();
    let mut iface = NoticeLog::new();

    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();

    assert!(matches!(
        failure.error,
        MergeError::Persistence { stage: PersistStage::Commit, advice: Some(_), .. }
    ));
    assert_eq!(failure.rollback, Some(RollbackScope::WholeSession));
    assert_eq!(features_of(&layer), before);
    assert!(!layer.is_editable());
    assert!(iface.last().unwrap().message.contains("locked"));
}

/// A layer whose backend rejects deletes
struct RejectingDeletes(VectorLayer);

impl EditableLayer for RejectingDeletes {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn provider(&self) -> ProviderKind {
        self.0.provider()
    }
    fn crs(&self) -> &CRS {
        self.0.crs()
    }
    fn fields(&self) -> &Fields {
        self.0.fields()
    }
    fn feature_count(&self) -> usize {
        self.0.feature_count()
    }
    fn feature(&self, id: FeatureId) -> Option<Feature> {
        self.0.feature(id)
    }
    fn selected_ids(&self) -> Vec<FeatureId> {
        self.0.selected_ids()
    }
    fn is_editable(&self) -> bool {
        self.0.is_editable()
    }
    fn start_editing(&mut self) -> Result<()> {
        self.0.start_editing()
    }
    fn checkpoint(&self) -> Result<Checkpoint> {
        self.0.checkpoint()
    }
    fn add_feature(&mut self, feature: Feature) -> Result<FeatureId> {
        self.0.add_feature(feature)
    }
    fn delete_features(&mut self, _ids: &[FeatureId]) -> Result<()> {
        Err(Error::Other("provider does not support deleting features".into()))
    }
    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<()> {
        self.0.rollback_to(checkpoint)
    }
    fn commit_changes(&mut self) -> Result<()> {
        self.0.commit_changes()
    }
    fn roll_back(&mut self) -> Result<()> {
        self.0.roll_back()
    }
    fn trigger_repaint(&mut self) {
        self.0.trigger_repaint()
    }
}

#[test]
fn delete_failure_removes_the_added_feature() {
    let mut inner = cs92_layer(ProviderKind::Database, 0);
    inner.select(&ids(&[1, 2]));
    let before = features_of(&inner);
    let mut layer = RejectingDeletes(inner);
    let mut iface = NoticeLog::new();

    let failure =
        merge_selected(Some(&mut layer), &mut iface, &MergeParams::default()).unwrap_err();

    assert!(matches!(
        failure.error,
        MergeError::Persistence { stage: PersistStage::DeleteFeatures, .. }
    ));
    assert_eq!(failure.rollback, Some(RollbackScope::WholeSession));
    assert_eq!(features_of(&layer.0), before);
    assert!(layer.0.feature(FeatureId(5)).is_none());
    assert!(!layer.0.is_editable());
    assert_eq!(layer.0.repaint_requests(), 0);
    assert!(iface
        .last()
        .unwrap()
        .message
        .contains("provider does not support deleting features"));
}

#[test]
fn works_through_a_trait_object() {
    let mut layer = cs92_layer(ProviderKind::Database, 0);
    layer.select(&ids(&[1, 2]));
    let dyn_layer: &mut dyn EditableLayer = &mut layer;
    let report =
        merge_selected(Some(dyn_layer), &mut NoticeLog::new(), &MergeParams::default()).unwrap();
    assert_eq!(report.merged_ids, ids(&[1, 2]));
    assert_eq!(layer.feature_count(), 3);
}

// ── Properties ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn union_covers_every_input(
        rects in proptest::collection::vec(
            (0.0f64..0.01, 0.0f64..0.01, 0.0005f64..0.005, 0.0005f64..0.005),
            2..5,
        )
    ) {
        let mut layer = VectorLayer::new("p", ProviderKind::Database, CRS::wgs84(), schema(0));
        for (i, (x, y, w, h)) in rects.iter().enumerate() {
            let geom = rect(19.0 + x, 52.0 + y, *w, *h);
            layer.insert_committed(parcel(geom, &i.to_string(), "x")).unwrap();
        }
        let largest = features_of(&layer)
            .iter()
            .filter_map(|f| f.geometry.as_ref().map(|g| g.unsigned_area()))
            .fold(0.0, f64::max);
        let count = layer.feature_count();
        layer.select_all();

        let report = merge_selected(Some(&mut layer), &mut NoticeLog::new(), &MergeParams::default())
            .unwrap();

        let merged = layer.feature(report.new_feature_id).unwrap();
        let area = merged.geometry.as_ref().unwrap().unsigned_area();
        prop_assert!(area >= largest * (1.0 - 1e-9));
        prop_assert_eq!(layer.feature_count(), 1);
        prop_assert_eq!(report.merged_count, count);
    }
}
