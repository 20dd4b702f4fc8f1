//! Merge failure taxonomy

use std::error::Error as StdError;
use std::fmt;

use parcelmerge_core::{Error, FeatureId, ProviderKind};

use crate::interface::NoticeLevel;

/// Advice shown when a file-backed layer rejects a change
pub const FILE_BACKEND_ADVICE: &str = "Check that the layer file is not locked by another \
program, that you have write permission to it, and that a network path is reachable.";

/// Step of the commit sequence that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    AddFeature,
    DeleteFeatures,
    Commit,
}

impl fmt::Display for PersistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PersistStage::AddFeature => "add the merged feature",
            PersistStage::DeleteFeatures => "delete the original features",
            PersistStage::Commit => "commit the changes",
        };
        write!(f, "{}", s)
    }
}

/// Broad class of a merge error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Precondition,
    Session,
    Geometry,
    Measurement,
    Schema,
    Persistence,
}

/// Why a merge could not be carried out
#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("Select an active vector layer")]
    NoActiveLayer,

    #[error("Select at least {required} features (selected: {selected})")]
    TooFewSelected { selected: usize, required: usize },

    #[error(
        "Layer '{layer}' is a temporary layer; export it to a persistent file format \
         (e.g. GeoPackage) and run the merge on the saved layer"
    )]
    TemporaryLayer { layer: String },

    #[error("Field '{field}' must be a text field (found {found})")]
    ParcelFieldNotText { field: String, found: &'static str },

    #[error("Could not start editing layer '{layer}'")]
    SessionUnavailable {
        layer: String,
        #[source]
        source: Error,
    },

    #[error("Only {valid} selected features have a usable geometry, at least {required} are needed")]
    InsufficientGeometries { valid: usize, required: usize },

    #[error("No selected feature has a measurable geometry to take attributes from")]
    NoRepresentative,

    #[error("The union of the selected geometries is empty")]
    EmptyUnion,

    #[error("The union of the selected geometries is invalid and could not be repaired")]
    UnionRepairFailed,

    #[error("Could not measure the area in {crs}")]
    Measurement {
        crs: String,
        #[source]
        source: Error,
    },

    #[error(
        "Merged value for field '{field}' is {actual} bytes long but the field holds at most \
         {limit} bytes: \"{preview}\". Select fewer features"
    )]
    FieldTooLong {
        field: String,
        limit: usize,
        actual: usize,
        preview: String,
    },

    #[error("Could not {stage}")]
    Persistence {
        stage: PersistStage,
        #[source]
        source: Error,
        advice: Option<&'static str>,
    },
}

impl MergeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MergeError::NoActiveLayer
            | MergeError::TooFewSelected { .. }
            | MergeError::TemporaryLayer { .. }
            | MergeError::ParcelFieldNotText { .. } => ErrorCategory::Precondition,
            MergeError::SessionUnavailable { .. } => ErrorCategory::Session,
            MergeError::InsufficientGeometries { .. }
            | MergeError::NoRepresentative
            | MergeError::EmptyUnion
            | MergeError::UnionRepairFailed => ErrorCategory::Geometry,
            MergeError::Measurement { .. } => ErrorCategory::Measurement,
            MergeError::FieldTooLong { .. } => ErrorCategory::Schema,
            MergeError::Persistence { .. } => ErrorCategory::Persistence,
        }
    }

    /// Notice level used when reporting this error to the user
    pub fn level(&self) -> NoticeLevel {
        match self.category() {
            ErrorCategory::Precondition => NoticeLevel::Warning,
            _ => NoticeLevel::Critical,
        }
    }

    pub fn advice(&self) -> Option<&'static str> {
        match self {
            MergeError::Persistence { advice, .. } => *advice,
            _ => None,
        }
    }

    /// Message and every underlying cause, joined with `: `
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// What was undone after a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackScope {
    /// The session opened by the merge was discarded; the layer left edit mode
    WholeSession,
    /// Only the merge's own changes were undone; earlier edits are still pending
    OperationOnly,
    /// Undoing failed; the layer may hold partial changes
    Failed { detail: String },
}

impl fmt::Display for RollbackScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackScope::WholeSession => {
                write!(f, "All changes were rolled back and the layer left editing mode.")
            }
            RollbackScope::OperationOnly => write!(
                f,
                "Only the merge's own changes were rolled back; earlier edits in the open \
                 editing session are still pending."
            ),
            RollbackScope::Failed { detail } => write!(
                f,
                "Rolling back failed ({}); check the layer for partial changes.",
                detail
            ),
        }
    }
}

/// Error returned by a failed merge
#[derive(thiserror::Error, Debug)]
#[error("merge failed")]
pub struct MergeFailure {
    #[source]
    pub error: MergeError,
    /// `None` when the merge failed before touching the editing session
    pub rollback: Option<RollbackScope>,
}

impl MergeFailure {
    pub fn new(error: MergeError, rollback: Option<RollbackScope>) -> Self {
        Self { error, rollback }
    }

    /// Text shown to the user: cause, advice and rollback scope
    pub fn user_message(&self) -> String {
        let mut msg = self.error.detail();
        if let Some(advice) = self.error.advice() {
            msg.push_str("\n\n");
            msg.push_str(advice);
        }
        if let Some(scope) = &self.rollback {
            msg.push_str("\n\n");
            msg.push_str(&scope.to_string());
        }
        msg
    }
}

impl From<MergeError> for MergeFailure {
    fn from(error: MergeError) -> Self {
        Self::new(error, None)
    }
}

/// Advisory text for persistence failures on `provider`
pub(crate) fn backend_advice(provider: ProviderKind) -> Option<&'static str> {
    provider.is_file_backed().then_some(FILE_BACKEND_ADVICE)
}

/// Ids listed in messages, e.g. `1, 4, 7`
pub(crate) fn format_ids(ids: &[FeatureId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
