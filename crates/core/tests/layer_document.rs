//! Layer documents on disk: opening, editing sessions and commit.

use geo_types::{polygon, Geometry};
use parcelmerge_core::io::{read_layer, write_layer};
use parcelmerge_core::{
    AttributeValue, EditableLayer, Error, Feature, FeatureId, Field, FieldType, Fields,
    ProviderKind, VectorLayer, CRS,
};
use tempfile::TempDir;

const DOCUMENT: &str = r#"{
  "name": "dzialki",
  "provider": "flat_file",
  "crs": { "epsg": 2180 },
  "fields": [
    { "name": "nr_dzialki", "type": "text", "length": 10 },
    { "name": "pole", "type": "real" }
  ],
  "features": [
    {
      "id": 1,
      "geometry": { "Point": { "x": 500000.0, "y": 480000.0 } },
      "attributes": { "nr_dzialki": "12/3", "pole": 0.25 }
    },
    {
      "id": 7,
      "geometry": null,
      "attributes": { "nr_dzialki": null }
    }
  ]
}"#;

fn write_fixture(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("dzialki.json");
    std::fs::write(&path, DOCUMENT).unwrap();
    path
}

#[test]
fn open_reads_schema_and_features() {
    let dir = TempDir::new().unwrap();
    let layer = VectorLayer::open(write_fixture(&dir)).unwrap();

    assert_eq!(layer.name(), "dzialki");
    assert_eq!(layer.provider(), ProviderKind::FlatFile);
    assert_eq!(layer.crs().epsg(), Some(2180));
    assert_eq!(layer.fields().len(), 2);
    assert_eq!(layer.feature_ids(), vec![FeatureId(1), FeatureId(7)]);

    let first = layer.feature(FeatureId(1)).unwrap();
    assert_eq!(first.attribute("pole"), AttributeValue::Float(0.25));
    assert!(layer.feature(FeatureId(7)).unwrap().geometry.is_none());
    assert!(!layer.is_read_only());
}

#[test]
fn read_only_file_opens_read_only() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&path, perms).unwrap();

    let mut layer = VectorLayer::open(&path).unwrap();
    assert!(layer.is_read_only());
    assert!(matches!(layer.start_editing(), Err(Error::ReadOnly { .. })));
}

#[test]
fn invalid_documents_are_rejected() {
    let dir = TempDir::new().unwrap();

    let too_long = DOCUMENT.replace("12/3", "12/3,12/4,12/5");
    let path = dir.path().join("long.json");
    std::fs::write(&path, too_long).unwrap();
    assert!(matches!(
        VectorLayer::open(&path),
        Err(Error::ValueTooLong { limit: 10, .. })
    ));

    let duplicate = DOCUMENT.replace("\"id\": 7", "\"id\": 1");
    let path = dir.path().join("dup.json");
    std::fs::write(&path, duplicate).unwrap();
    assert!(VectorLayer::open(&path).is_err());

    let path = dir.path().join("garbage.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(VectorLayer::open(&path), Err(Error::Json(_))));
}

#[test]
fn commit_rewrites_document_and_roll_back_does_not() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir);
    let mut layer = VectorLayer::open(&path).unwrap();

    layer.start_editing().unwrap();
    layer.delete_features(&[FeatureId(7)]).unwrap();
    layer.roll_back().unwrap();
    assert_eq!(read_layer(&path).unwrap().features.len(), 2);

    layer.start_editing().unwrap();
    let added = layer
        .add_feature(
            Feature::new(Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
            ]))
            .with_property("nr_dzialki", "44"),
        )
        .unwrap();
    assert_eq!(added, FeatureId(8));
    layer.delete_features(&[FeatureId(1)]).unwrap();
    layer.commit_changes().unwrap();

    let doc = read_layer(&path).unwrap();
    let stored: Vec<_> = doc.features.iter().filter_map(|f| f.id).collect();
    assert_eq!(stored, vec![FeatureId(7), FeatureId(8)]);
    assert_eq!(doc.crs, CRS::poland_cs92());
}

#[test]
fn save_as_then_reopen() {
    let dir = TempDir::new().unwrap();
    let fields = Fields::new(vec![
        Field::text("nr_dzialki", 0),
        Field::new("pow", FieldType::Integer),
    ])
    .unwrap();
    let mut layer = VectorLayer::new("nowa", ProviderKind::Database, CRS::from_epsg(2178), fields);
    layer
        .insert_committed(Feature::empty().with_property("pow", 3i64))
        .unwrap();

    let path = dir.path().join("nowa.json");
    layer.save_as(&path).unwrap();
    assert_eq!(layer.path(), Some(path.as_path()));

    let reopened = VectorLayer::open(&path).unwrap();
    assert_eq!(reopened.feature_ids(), vec![FeatureId(1)]);
    assert_eq!(
        reopened.feature(FeatureId(1)).unwrap().attribute("pow"),
        AttributeValue::Int(3)
    );

    // Writing again over the existing document replaces it
    let mut doc = read_layer(&path).unwrap();
    doc.name = "renamed".into();
    write_layer(&path, &doc).unwrap();
    assert_eq!(VectorLayer::open(&path).unwrap().name(), "renamed");
}
