use std::fmt;

use serde::{Deserialize, Serialize};

use super::source::FeatureSet;

/// Handle referencing a layer object owned by the rendering collaborator.
///
/// The registry never interprets the value; it only passes it back to the
/// backend on attach/detach.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct RenderableHandle(pub u64);

/// Identifier of a catalogued layer, unique across both layer kinds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
  /// Background cartography (tile imagery and similar), not user-editable.
  Map,
  /// Holds discrete, individually addressable features.
  Feature,
}

impl LayerKind {
  #[must_use]
  pub fn name(&self) -> &'static str {
    match self {
      LayerKind::Map => "Map",
      LayerKind::Feature => "Feature",
    }
  }

  #[must_use]
  pub fn all() -> &'static [LayerKind] {
    &[LayerKind::Map, LayerKind::Feature]
  }

  /// Start of the z-index range for this kind. Feature layers draw above
  /// map layers regardless of how many map layers exist; the partition is
  /// static, so computing a z-index stays O(1).
  #[must_use]
  pub fn base_offset(self) -> u32 {
    match self {
      LayerKind::Map => 1,
      LayerKind::Feature => 1_000_000,
    }
  }
}

impl fmt::Display for LayerKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LayerKind::Map => write!(f, "map"),
      LayerKind::Feature => write!(f, "feature"),
    }
  }
}

/// Registration options for [`LayerRegistry::add_map_layer`] and
/// [`LayerRegistry::add_feature_layer`].
///
/// [`LayerRegistry::add_map_layer`]: super::LayerRegistry::add_map_layer
/// [`LayerRegistry::add_feature_layer`]: super::LayerRegistry::add_feature_layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct LayerOptions {
  /// Explicit id. Colliding with an already registered id is rejected.
  pub id: Option<LayerId>,
  /// Display name; blank input falls back to the configured placeholder.
  pub name: String,
  pub visible: bool,
  /// Forwarded unchanged in the added/removed event payload; subscribers
  /// decide what to suppress, delivery itself is never skipped.
  pub silent: bool,
  pub disable_edit: bool,
  pub disable_delete: bool,
  /// Marks layers synthesized on demand rather than registered by a tool.
  pub dynamically_added: bool,
}

impl Default for LayerOptions {
  fn default() -> Self {
    Self {
      id: None,
      name: String::new(),
      visible: true,
      silent: false,
      disable_edit: false,
      disable_delete: false,
      dynamically_added: false,
    }
  }
}

impl LayerOptions {
  #[must_use]
  pub fn with_id(mut self, id: LayerId) -> Self {
    self.id = Some(id);
    self
  }

  #[must_use]
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  #[must_use]
  pub fn with_visible(mut self, visible: bool) -> Self {
    self.visible = visible;
    self
  }

  #[must_use]
  pub fn with_silent(mut self, silent: bool) -> Self {
    self.silent = silent;
    self
  }

  #[must_use]
  pub fn with_disable_edit(mut self, disable_edit: bool) -> Self {
    self.disable_edit = disable_edit;
    self
  }

  #[must_use]
  pub fn with_disable_delete(mut self, disable_delete: bool) -> Self {
    self.disable_delete = disable_delete;
    self
  }

  #[must_use]
  pub fn with_dynamically_added(mut self, dynamically_added: bool) -> Self {
    self.dynamically_added = dynamically_added;
    self
  }
}

/// Replaces blank (empty or whitespace-only) names with a placeholder.
pub(crate) fn name_or_default(name: &str, fallback: &str) -> String {
  if name.trim().is_empty() {
    fallback.to_owned()
  } else {
    name.to_owned()
  }
}

/// One catalogued layer. Created only by the registry; the mutable fields
/// (name, visibility, z-index) change only through registry setters so that
/// notifications stay accurate. Callers hold value copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct LayerRecord {
  id: LayerId,
  name: String,
  kind: LayerKind,
  renderable: RenderableHandle,
  visible: bool,
  z_index: u32,
  dynamically_added: bool,
  disable_edit: bool,
  disable_delete: bool,
  source: Option<FeatureSet>,
}

impl LayerRecord {
  pub(crate) fn new(
    id: LayerId,
    name: String,
    kind: LayerKind,
    renderable: RenderableHandle,
    z_index: u32,
    options: &LayerOptions,
    source: Option<FeatureSet>,
  ) -> Self {
    Self {
      id,
      name,
      kind,
      renderable,
      visible: options.visible,
      z_index,
      dynamically_added: options.dynamically_added,
      disable_edit: options.disable_edit,
      disable_delete: options.disable_delete,
      source,
    }
  }

  #[must_use]
  pub fn id(&self) -> LayerId {
    self.id
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn kind(&self) -> LayerKind {
    self.kind
  }

  #[must_use]
  pub fn renderable(&self) -> RenderableHandle {
    self.renderable
  }

  #[must_use]
  pub fn visible(&self) -> bool {
    self.visible
  }

  #[must_use]
  pub fn z_index(&self) -> u32 {
    self.z_index
  }

  #[must_use]
  pub fn dynamically_added(&self) -> bool {
    self.dynamically_added
  }

  #[must_use]
  pub fn disable_edit(&self) -> bool {
    self.disable_edit
  }

  #[must_use]
  pub fn disable_delete(&self) -> bool {
    self.disable_delete
  }

  /// The layer's feature container. `None` for map layers without one.
  #[must_use]
  pub fn source(&self) -> Option<&FeatureSet> {
    self.source.as_ref()
  }

  pub(crate) fn source_mut(&mut self) -> Option<&mut FeatureSet> {
    self.source.as_mut()
  }

  pub(crate) fn set_name(&mut self, name: String) {
    self.name = name;
  }

  pub(crate) fn set_visible(&mut self, visible: bool) {
    self.visible = visible;
  }

  pub(crate) fn set_z_index(&mut self, z_index: u32) {
    self.z_index = z_index;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;

  #[rstest]
  #[case("", "Layer", "Layer")]
  #[case("   ", "Layer", "Layer")]
  #[case("\t\n", "Drawing layer", "Drawing layer")]
  #[case("Roads", "Layer", "Roads")]
  #[case("  Roads  ", "Layer", "  Roads  ")]
  fn test_name_or_default(#[case] input: &str, #[case] fallback: &str, #[case] expected: &str) {
    assert_eq!(name_or_default(input, fallback), expected);
  }

  #[test]
  fn test_base_offsets_partition() {
    assert_eq!(LayerKind::Map.base_offset(), 1);
    assert_eq!(LayerKind::Feature.base_offset(), 1_000_000);
    // Even an absurd map layer count never reaches the feature range.
    assert!(LayerKind::Map.base_offset() + 100_000 < LayerKind::Feature.base_offset());
  }

  #[test]
  fn test_options_defaults() {
    let options = LayerOptions::default();
    assert!(options.visible);
    assert!(!options.silent);
    assert!(!options.disable_edit);
    assert!(!options.disable_delete);
    assert!(!options.dynamically_added);
    assert_eq!(options.id, None);
    assert!(options.name.is_empty());
  }

  #[test]
  fn test_options_builders() {
    let options = LayerOptions::default()
      .with_id(LayerId(7))
      .with_name("Measurements")
      .with_visible(false)
      .with_silent(true);
    assert_eq!(options.id, Some(LayerId(7)));
    assert_eq!(options.name, "Measurements");
    assert!(!options.visible);
    assert!(options.silent);
  }
}
