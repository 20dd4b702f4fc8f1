//! Editing session buffer with an undo log

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::vector::{Feature, FeatureId};

/// Position in a session's edit log.
///
/// Rolling back to a checkpoint undoes every change recorded after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub(crate) usize);

impl Checkpoint {
    /// The start of a session
    pub const START: Checkpoint = Checkpoint(0);

    pub fn position(&self) -> usize {
        self.0
    }
}

/// Next free id: one past the largest id in `features`
pub(crate) fn next_id(features: &BTreeMap<FeatureId, Feature>) -> FeatureId {
    features
        .keys()
        .next_back()
        .map(|id| FeatureId(id.0 + 1))
        .unwrap_or(FeatureId(1))
}

/// A recorded change, with what is needed to undo it
#[derive(Debug, Clone)]
pub(crate) enum EditCommand {
    Added(FeatureId),
    Deleted { feature: Feature, was_selected: bool },
}

/// Pending changes of an open editing session.
///
/// Holds a working copy of the layer's features; nothing reaches the
/// committed store until the session is committed.
#[derive(Debug, Clone)]
pub(crate) struct EditBuffer {
    pub(crate) working: BTreeMap<FeatureId, Feature>,
    log: Vec<EditCommand>,
}

impl EditBuffer {
    pub(crate) fn new(features: &BTreeMap<FeatureId, Feature>) -> Self {
        Self {
            working: features.clone(),
            log: Vec::new(),
        }
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.log.len())
    }

    pub(crate) fn is_modified(&self) -> bool {
        !self.log.is_empty()
    }

    pub(crate) fn next_id(&self) -> FeatureId {
        next_id(&self.working)
    }

    pub(crate) fn add(&mut self, mut feature: Feature) -> FeatureId {
        let id = self.next_id();
        feature.id = Some(id);
        self.working.insert(id, feature);
        self.log.push(EditCommand::Added(id));
        id
    }

    /// Remove all `ids`, or none of them if any is missing
    pub(crate) fn delete(
        &mut self,
        ids: &[FeatureId],
        is_selected: impl Fn(FeatureId) -> bool,
    ) -> Result<()> {
        if let Some(missing) = ids.iter().find(|id| !self.working.contains_key(*id)) {
            return Err(Error::FeatureNotFound(*missing));
        }
        for id in ids {
            if let Some(feature) = self.working.remove(id) {
                self.log.push(EditCommand::Deleted {
                    feature,
                    was_selected: is_selected(*id),
                });
            }
        }
        Ok(())
    }

    /// Undo every change after `checkpoint`, newest first.
    ///
    /// Returns the ids of deleted features that were selected when they
    /// were deleted, so the caller can restore the selection.
    pub(crate) fn rollback_to(&mut self, checkpoint: Checkpoint) -> Result<Vec<FeatureId>> {
        if checkpoint.0 > self.log.len() {
            return Err(Error::InvalidCheckpoint {
                checkpoint: checkpoint.0,
                len: self.log.len(),
            });
        }
        let mut reselect = Vec::new();
        while self.log.len() > checkpoint.0 {
            match self.log.pop() {
                Some(EditCommand::Added(id)) => {
                    self.working.remove(&id);
                }
                Some(EditCommand::Deleted {
                    feature,
                    was_selected,
                }) => {
                    if let Some(id) = feature.id {
                        if was_selected {
                            reselect.push(id);
                        }
                        self.working.insert(id, feature);
                    }
                }
                None => break,
            }
        }
        Ok(reselect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Geometry};

    fn store(ids: &[u64]) -> BTreeMap<FeatureId, Feature> {
        ids.iter()
            .map(|&i| {
                let mut f = Feature::new(Geometry::Point(point!(x: i as f64, y: 0.0)));
                f.id = Some(FeatureId(i));
                (FeatureId(i), f)
            })
            .collect()
    }

    #[test]
    fn test_next_id_follows_max() {
        let buffer = EditBuffer::new(&store(&[1, 4, 2]));
        assert_eq!(buffer.next_id(), FeatureId(5));
        assert_eq!(EditBuffer::new(&BTreeMap::new()).next_id(), FeatureId(1));
    }

    #[test]
    fn test_delete_is_all_or_nothing() {
        let mut buffer = EditBuffer::new(&store(&[1, 2]));
        let err = buffer.delete(&[FeatureId(1), FeatureId(9)], |_| false).unwrap_err();
        assert!(matches!(err, Error::FeatureNotFound(FeatureId(9))));
        assert_eq!(buffer.working.len(), 2);
        assert!(!buffer.is_modified());
    }

    #[test]
    fn test_rollback_to_checkpoint() {
        let original = store(&[1, 2, 3]);
        let mut buffer = EditBuffer::new(&original);

        buffer.delete(&[FeatureId(3)], |_| false).unwrap();
        let checkpoint = buffer.checkpoint();

        let added = buffer.add(Feature::empty());
        assert_eq!(added, FeatureId(3));
        buffer.delete(&[FeatureId(1), FeatureId(2)], |id| id == FeatureId(2)).unwrap();

        let reselect = buffer.rollback_to(checkpoint).unwrap();
        assert_eq!(reselect, vec![FeatureId(2)]);
        let ids: Vec<_> = buffer.working.keys().copied().collect();
        assert_eq!(ids, vec![FeatureId(1), FeatureId(2)]);

        buffer.rollback_to(Checkpoint::START).unwrap();
        assert_eq!(buffer.working, original);
    }

    #[test]
    fn test_rollback_past_log_fails() {
        let mut buffer = EditBuffer::new(&store(&[1]));
        assert!(matches!(
            buffer.rollback_to(Checkpoint(3)),
            Err(Error::InvalidCheckpoint { checkpoint: 3, len: 0 })
        ));
    }
}
