//! Vector layers with selection and transactional editing sessions
//!
//! A layer keeps its committed features separate from the pending changes
//! of an open editing session. Reads see the session's working copy, the
//! committed store only changes on `commit_changes`.

mod edit;

pub use edit::Checkpoint;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io;
use crate::vector::{Feature, FeatureId, Fields};
use edit::EditBuffer;

/// Storage profile of the data provider behind a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Transient, in-memory only
    Memory,
    /// Flat-file tabular storage with per-field text byte limits (shapefile/DBF style)
    FlatFile,
    /// File database without text limits (GeoPackage style)
    Database,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Memory => "memory",
            ProviderKind::FlatFile => "flat_file",
            ProviderKind::Database => "database",
        }
    }

    /// Whether data is lost when the application exits
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderKind::Memory)
    }

    /// Whether text values are limited to the field's declared length
    pub fn enforces_text_length(&self) -> bool {
        matches!(self, ProviderKind::FlatFile)
    }

    pub fn is_file_backed(&self) -> bool {
        !self.is_transient()
    }
}

/// Layer capabilities consumed by editing operations.
///
/// Implemented by [`VectorLayer`]; host applications can implement it over
/// their own data-provider layer.
pub trait EditableLayer {
    fn name(&self) -> &str;

    fn provider(&self) -> ProviderKind;

    fn crs(&self) -> &CRS;

    fn fields(&self) -> &Fields;

    fn feature_count(&self) -> usize;

    /// Current state of a feature (the session's working copy when editing)
    fn feature(&self, id: FeatureId) -> Option<Feature>;

    /// Selected feature ids in ascending order
    fn selected_ids(&self) -> Vec<FeatureId>;

    fn selected_features(&self) -> Vec<Feature> {
        self.selected_ids()
            .into_iter()
            .filter_map(|id| self.feature(id))
            .collect()
    }

    fn is_editable(&self) -> bool;

    /// Open an editing session
    fn start_editing(&mut self) -> Result<()>;

    /// Current position in the open session's edit log
    fn checkpoint(&self) -> Result<Checkpoint>;

    /// Add a feature to the open session, returning its id
    fn add_feature(&mut self, feature: Feature) -> Result<FeatureId>;

    /// Delete features from the open session; all or nothing
    fn delete_features(&mut self, ids: &[FeatureId]) -> Result<()>;

    /// Undo the session's changes made after `checkpoint`, keeping it open
    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<()>;

    /// Persist the session's changes and close it
    fn commit_changes(&mut self) -> Result<()>;

    /// Discard the session's changes and close it
    fn roll_back(&mut self) -> Result<()>;

    /// Ask the host to redraw the layer
    fn trigger_repaint(&mut self);
}

/// A vector layer with an optional on-disk layer document
#[derive(Debug, Clone)]
pub struct VectorLayer {
    name: String,
    provider: ProviderKind,
    crs: CRS,
    fields: Fields,
    features: BTreeMap<FeatureId, Feature>,
    selection: BTreeSet<FeatureId>,
    path: Option<PathBuf>,
    read_only: bool,
    session: Option<EditBuffer>,
    repaints: usize,
}

impl VectorLayer {
    /// Create an empty layer
    pub fn new(name: impl Into<String>, provider: ProviderKind, crs: CRS, fields: Fields) -> Self {
        Self {
            name: name.into(),
            provider,
            crs,
            fields,
            features: BTreeMap::new(),
            selection: BTreeSet::new(),
            path: None,
            read_only: false,
            session: None,
            repaints: 0,
        }
    }

    /// Transient in-memory layer
    pub fn memory(name: impl Into<String>, crs: CRS, fields: Fields) -> Self {
        Self::new(name, ProviderKind::Memory, crs, fields)
    }

    /// Open a layer document from disk.
    ///
    /// The layer is read-only when the file is not writable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = io::read_layer(path)?;
        let read_only = std::fs::metadata(path)?.permissions().readonly();

        let mut layer = Self::new(doc.name, doc.provider, doc.crs, doc.fields);
        for feature in doc.features {
            let id = feature.id.ok_or_else(|| {
                Error::Other(format!("feature without id in {}", path.display()))
            })?;
            layer.check_feature(&feature)?;
            if layer.features.insert(id, feature).is_some() {
                return Err(Error::Other(format!(
                    "duplicate feature id {} in {}",
                    id,
                    path.display()
                )));
            }
        }
        layer.path = Some(path.to_path_buf());
        layer.read_only = read_only;
        debug!(
            "Opened layer '{}' ({} features, provider {})",
            layer.name,
            layer.features.len(),
            layer.provider.name()
        );
        Ok(layer)
    }

    /// Write the committed features to `path` and back the layer with it
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        io::write_layer(path, &self.to_document())?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Whether the open session has uncommitted changes
    pub fn is_modified(&self) -> bool {
        self.session.as_ref().is_some_and(EditBuffer::is_modified)
    }

    /// Number of repaint requests received
    pub fn repaint_requests(&self) -> usize {
        self.repaints
    }

    /// Committed features, ignoring any open session
    pub fn committed_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// Ids currently visible (working copy when editing)
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.current().keys().copied().collect()
    }

    /// Add a feature directly to the committed store, outside any session.
    ///
    /// Used to populate layers; fails while a session is open.
    pub fn insert_committed(&mut self, mut feature: Feature) -> Result<FeatureId> {
        if self.session.is_some() {
            return Err(Error::AlreadyEditing {
                layer: self.name.clone(),
            });
        }
        self.check_feature(&feature)?;
        let id = edit::next_id(&self.features);
        feature.id = Some(id);
        self.features.insert(id, feature);
        Ok(id)
    }

    /// Replace the selection; unknown ids are ignored
    pub fn select(&mut self, ids: &[FeatureId]) {
        let current = self.current();
        let selection = ids
            .iter()
            .copied()
            .filter(|id| current.contains_key(id))
            .collect();
        self.selection = selection;
    }

    pub fn select_all(&mut self) {
        self.selection = self.current().keys().copied().collect();
    }

    fn current(&self) -> &BTreeMap<FeatureId, Feature> {
        match &self.session {
            Some(buffer) => &buffer.working,
            None => &self.features,
        }
    }

    fn session_mut(&mut self) -> Result<&mut EditBuffer> {
        let name = &self.name;
        self.session.as_mut().ok_or_else(|| Error::NotEditable {
            layer: name.clone(),
        })
    }

    /// Check attribute names, types and text lengths against the schema
    fn check_feature(&self, feature: &Feature) -> Result<()> {
        for (key, value) in &feature.properties {
            let field = self
                .fields
                .by_name(key)
                .ok_or_else(|| Error::UnknownField(key.clone()))?;
            if !field.field_type.accepts(value) {
                return Err(Error::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type.name(),
                    found: value.type_name(),
                });
            }
            if let crate::vector::AttributeValue::String(s) = value {
                if self.provider.enforces_text_length() && field.length > 0 && s.len() > field.length
                {
                    return Err(Error::ValueTooLong {
                        field: field.name.clone(),
                        limit: field.length,
                        actual: s.len(),
                    });
                }
            }
        }
        Ok(())
    }

    fn to_document(&self) -> io::LayerDocument {
        io::LayerDocument {
            name: self.name.clone(),
            provider: self.provider,
            crs: self.crs.clone(),
            fields: self.fields.clone(),
            features: self.features.values().cloned().collect(),
        }
    }
}

impl EditableLayer for VectorLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn crs(&self) -> &CRS {
        &self.crs
    }

    fn fields(&self) -> &Fields {
        &self.fields
    }

    fn feature_count(&self) -> usize {
        self.current().len()
    }

    fn feature(&self, id: FeatureId) -> Option<Feature> {
        self.current().get(&id).cloned()
    }

    fn selected_ids(&self) -> Vec<FeatureId> {
        self.selection.iter().copied().collect()
    }

    fn is_editable(&self) -> bool {
        self.session.is_some()
    }

    fn start_editing(&mut self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly {
                layer: self.name.clone(),
            });
        }
        if self.session.is_some() {
            return Err(Error::AlreadyEditing {
                layer: self.name.clone(),
            });
        }
        self.session = Some(EditBuffer::new(&self.features));
        debug!("Editing session opened on '{}'", self.name);
        Ok(())
    }

    fn checkpoint(&self) -> Result<Checkpoint> {
        self.session
            .as_ref()
            .map(EditBuffer::checkpoint)
            .ok_or_else(|| Error::NotEditable {
                layer: self.name.clone(),
            })
    }

    fn add_feature(&mut self, feature: Feature) -> Result<FeatureId> {
        self.check_feature(&feature)?;
        let id = self.session_mut()?.add(feature);
        Ok(id)
    }

    fn delete_features(&mut self, ids: &[FeatureId]) -> Result<()> {
        let selection = self.selection.clone();
        self.session_mut()?
            .delete(ids, |id| selection.contains(&id))?;
        for id in ids {
            self.selection.remove(id);
        }
        Ok(())
    }

    fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let reselect = self.session_mut()?.rollback_to(checkpoint)?;
        self.selection.extend(reselect);
        let current: BTreeSet<FeatureId> = self.current().keys().copied().collect();
        self.selection.retain(|id| current.contains(id));
        Ok(())
    }

    fn commit_changes(&mut self) -> Result<()> {
        let working = match &self.session {
            Some(buffer) => buffer.working.clone(),
            None => {
                return Err(Error::NotEditable {
                    layer: self.name.clone(),
                })
            }
        };

        if let Some(path) = &self.path {
            let mut doc = self.to_document();
            doc.features = working.values().cloned().collect();
            // The session stays open when the write fails
            io::write_layer(path, &doc)?;
        }

        self.features = working;
        self.session = None;
        debug!("Editing session committed on '{}'", self.name);
        Ok(())
    }

    fn roll_back(&mut self) -> Result<()> {
        self.rollback_to(Checkpoint::START)?;
        self.session = None;
        debug!("Editing session rolled back on '{}'", self.name);
        Ok(())
    }

    fn trigger_repaint(&mut self) {
        self.repaints += 1;
    }
}
