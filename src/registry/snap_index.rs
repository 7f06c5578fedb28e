use std::collections::HashSet;

use super::source::{FeatureId, FeatureSet};

/// Secondary index of every feature that belongs to a live feature layer,
/// consumed by geometry snapping during draw/edit gestures.
///
/// Kept consistent incrementally on each mutation; it is never recomputed
/// from the catalogues, so membership updates stay O(1) on interaction
/// paths. After every completed registry mutation its content equals the
/// union of the features of all live feature layers.
#[derive(Debug, Clone, Default)]
pub struct SnapIndex {
  features: HashSet<FeatureId>,
}

impl SnapIndex {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Idempotent insert.
  pub fn add(&mut self, feature: FeatureId) {
    self.features.insert(feature);
  }

  /// Idempotent delete, no-op if absent.
  pub fn remove(&mut self, feature: FeatureId) {
    self.features.remove(&feature);
  }

  /// Drops every feature of a removed layer's source.
  pub fn purge_source(&mut self, source: &FeatureSet) {
    for feature in source.iter() {
      if !self.features.remove(&feature) {
        log::warn!("snap index was missing feature {feature} while purging a layer");
      }
    }
  }

  /// Empties the index. Used on full registry reset.
  pub fn clear(&mut self) {
    self.features.clear();
  }

  #[must_use]
  pub fn contains(&self, feature: FeatureId) -> bool {
    self.features.contains(&feature)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.features.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = FeatureId> + '_ {
    self.features.iter().copied()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_add_remove_idempotent() {
    let mut index = SnapIndex::new();
    index.add(FeatureId(1));
    index.add(FeatureId(1));
    assert_eq!(index.len(), 1);
    index.remove(FeatureId(2));
    assert_eq!(index.len(), 1);
    index.remove(FeatureId(1));
    assert!(index.is_empty());
  }

  #[test]
  fn test_purge_source() {
    let mut index = SnapIndex::new();
    let mut source = FeatureSet::new();
    source.add(FeatureId(1));
    source.add(FeatureId(2));
    for feature in source.iter() {
      index.add(feature);
    }
    index.add(FeatureId(9));

    index.purge_source(&source);
    assert_eq!(index.len(), 1);
    assert!(index.contains(FeatureId(9)));
  }

  #[test]
  fn test_clear() {
    let mut index = SnapIndex::new();
    index.add(FeatureId(1));
    index.clear();
    assert!(index.is_empty());
  }
}
