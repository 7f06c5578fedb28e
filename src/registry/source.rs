use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle referencing one geometric feature (marker, drawing, measurement).
///
/// The geometry itself lives with the rendering collaborator; the registry
/// only tracks membership.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Insertion-ordered, duplicate-free container of the features belonging to
/// one feature layer. Stands in for the collaborator's vector source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
  features: Vec<FeatureId>,
}

impl FeatureSet {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Idempotent insert. Returns whether the feature was newly added.
  pub fn add(&mut self, feature: FeatureId) -> bool {
    if self.contains(feature) {
      return false;
    }
    self.features.push(feature);
    true
  }

  /// Idempotent delete. Returns whether the feature was present.
  pub fn remove(&mut self, feature: FeatureId) -> bool {
    let before = self.features.len();
    self.features.retain(|f| *f != feature);
    self.features.len() != before
  }

  #[must_use]
  pub fn contains(&self, feature: FeatureId) -> bool {
    self.features.contains(&feature)
  }

  #[must_use]
  pub fn features(&self) -> &[FeatureId] {
    &self.features
  }

  pub fn iter(&self) -> impl Iterator<Item = FeatureId> + '_ {
    self.features.iter().copied()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.features.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.features.is_empty()
  }

  pub fn clear(&mut self) {
    self.features.clear();
  }
}
