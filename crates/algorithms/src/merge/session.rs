//! Scoped ownership of a layer's editing session

use parcelmerge_core::{Checkpoint, EditableLayer, Error};
use tracing::{debug, error, warn};

use super::error::{backend_advice, MergeError, PersistStage, RollbackScope};

/// What happened to the editing session after a successful merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The merge opened the session and committed it
    Committed,
    /// The session belongs to the caller and stays open with the changes pending
    LeftOpen,
}

#[derive(Debug, Clone, Copy)]
enum Ownership {
    /// Opened by the guard
    Owned,
    /// Already open; changes after the checkpoint belong to the guard
    Borrowed(Checkpoint),
}

/// Holds a layer's editing session for the duration of one operation.
///
/// An unfinished guard rolls back when dropped: the whole session if the
/// guard opened it, otherwise only the changes made since it was acquired.
pub struct EditGuard<'a, L: EditableLayer + ?Sized> {
    layer: &'a mut L,
    ownership: Ownership,
    finished: bool,
}

impl<'a, L: EditableLayer + ?Sized> EditGuard<'a, L> {
    /// Open a session on `layer`, or join the one already open
    pub fn acquire(layer: &'a mut L) -> Result<Self, MergeError> {
        let unavailable = |layer: &L, source: Error| MergeError::SessionUnavailable {
            layer: layer.name().to_string(),
            source,
        };
        let ownership = if layer.is_editable() {
            let checkpoint = layer.checkpoint().map_err(|e| unavailable(layer, e))?;
            debug!(
                "Joining open editing session on '{}' at {}",
                layer.name(),
                checkpoint.position()
            );
            Ownership::Borrowed(checkpoint)
        } else {
            layer.start_editing().map_err(|e| unavailable(layer, e))?;
            Ownership::Owned
        };
        Ok(Self {
            layer,
            ownership,
            finished: false,
        })
    }

    pub fn layer(&mut self) -> &mut L {
        self.layer
    }

    /// Whether the guard opened the session itself
    pub fn owns_session(&self) -> bool {
        matches!(self.ownership, Ownership::Owned)
    }

    /// Commit an owned session; leave a borrowed one open.
    ///
    /// A failed commit is rolled back before the error is returned.
    pub fn finish(mut self) -> Result<SessionOutcome, (MergeError, RollbackScope)> {
        self.finished = true;
        match self.ownership {
            Ownership::Borrowed(_) => Ok(SessionOutcome::LeftOpen),
            Ownership::Owned => match self.layer.commit_changes() {
                Ok(()) => Ok(SessionOutcome::Committed),
                Err(source) => {
                    let err = MergeError::Persistence {
                        stage: PersistStage::Commit,
                        source,
                        advice: backend_advice(self.layer.provider()),
                    };
                    let scope = self.undo();
                    Err((err, scope))
                }
            },
        }
    }

    /// Undo what the guard is responsible for
    pub fn rollback(mut self) -> RollbackScope {
        self.finished = true;
        self.undo()
    }

    fn undo(&mut self) -> RollbackScope {
        let result = match self.ownership {
            Ownership::Owned => self.layer.roll_back().map(|()| RollbackScope::WholeSession),
            Ownership::Borrowed(checkpoint) => self
                .layer
                .rollback_to(checkpoint)
                .map(|()| RollbackScope::OperationOnly),
        };
        match result {
            Ok(scope) => {
                debug!("Rolled back '{}': {:?}", self.layer.name(), scope);
                scope
            }
            Err(e) => {
                error!("Rollback of '{}' failed: {}", self.layer.name(), e);
                RollbackScope::Failed {
                    detail: e.to_string(),
                }
            }
        }
    }
}

impl<L: EditableLayer + ?Sized> Drop for EditGuard<'_, L> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Editing guard on '{}' dropped unfinished, rolling back", self.layer.name());
            self.undo();
        }
    }
}
