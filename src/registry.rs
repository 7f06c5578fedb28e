use itertools::Itertools as _;
use log::{debug, info};
use thiserror::Error;

use crate::config::MapboardConfig;
use crate::render::RenderBackend;

/// Synchronous registry event fan-out.
pub mod events;
/// Buffering of registrations issued before the host map exists.
pub mod pending;
/// Identity and value types for catalogued layers.
pub mod record;
/// The snap-feature index.
pub mod snap_index;
/// Per-layer feature containers.
pub mod source;

pub use events::{EventBus, EventKind, RegistryEvent};
pub use pending::{PendingAdd, PendingQueue};
pub use record::{LayerId, LayerKind, LayerOptions, LayerRecord, RenderableHandle};
pub use snap_index::SnapIndex;
pub use source::{FeatureId, FeatureSet};

use record::name_or_default;

/// Errors in [`LayerRegistry`]. Every failure here is deterministic and
/// signals caller-side misuse; nothing is transient or worth retrying.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
  #[error("no {kind} layer with id {id}")]
  NotFound { kind: LayerKind, id: LayerId },
  #[error("layer id {id} is already registered")]
  DuplicateId { id: LayerId },
  #[error("deferred queue was already flushed")]
  QueueSealed,
}

/// The registry's two-state bootstrap machine. The only legal transition is
/// Unbound to Bound, taken once by [`LayerRegistry::bind_host_map`].
enum Binding {
  Unbound(PendingQueue),
  Bound(Box<dyn RenderBackend>),
}

/// Authoritative store of map layers and feature layers for one map
/// instance.
///
/// Tools register layers at any time, including before the host map exists;
/// deferred registrations replay in original call order at bind. The
/// registry keeps the snap index consistent with the catalogues on every
/// mutation and broadcasts each committed mutation through its [`EventBus`],
/// so any subscriber observing an event sees fully consistent state.
///
/// One instance is constructed at application start and handed to every
/// tool; there is no global.
pub struct LayerRegistry {
  map_layers: Vec<LayerRecord>,
  feature_layers: Vec<LayerRecord>,
  /// Non-owning; points into `feature_layers` or, before bind, at a queued
  /// record.
  active_feature_layer: Option<LayerId>,
  binding: Binding,
  snap_index: SnapIndex,
  events: EventBus,
  next_layer_id: u64,
  next_renderable: u64,
  config: MapboardConfig,
}

impl Default for LayerRegistry {
  fn default() -> Self {
    Self::new()
  }
}

impl LayerRegistry {
  #[must_use]
  pub fn new() -> Self {
    Self::with_config(MapboardConfig::default())
  }

  #[must_use]
  pub fn with_config(config: MapboardConfig) -> Self {
    Self {
      map_layers: Vec::new(),
      feature_layers: Vec::new(),
      active_feature_layer: None,
      binding: Binding::Unbound(PendingQueue::new()),
      snap_index: SnapIndex::new(),
      events: EventBus::new(),
      next_layer_id: 1,
      next_renderable: 1,
      config,
    }
  }

  /// Registers a map layer whose renderable the caller already obtained
  /// from the rendering collaborator. Applied immediately when bound,
  /// deferred in call order otherwise; the record is returned synchronously
  /// either way.
  ///
  /// # Errors
  /// [`RegistryError::DuplicateId`] if `options.id` is already registered.
  pub fn add_map_layer(
    &mut self,
    renderable: RenderableHandle,
    options: LayerOptions,
  ) -> Result<LayerRecord, RegistryError> {
    let id = self.allocate_layer_id(options.id)?;
    let name = name_or_default(&options.name, self.config.map_layer_placeholder());
    let z_index = self.next_z_index(LayerKind::Map);
    let record = LayerRecord::new(id, name, LayerKind::Map, renderable, z_index, &options, None);

    match &mut self.binding {
      Binding::Unbound(queue) => {
        debug!("deferring map layer '{}' ({id}) until bind", record.name());
        queue.enqueue(PendingAdd {
          record: record.clone(),
          silent: options.silent,
        })?;
      }
      Binding::Bound(_) => {
        self.apply_map_layer(PendingAdd {
          record: record.clone(),
          silent: options.silent,
        });
      }
    }
    Ok(record)
  }

  /// Registers a feature layer with a freshly allocated renderable and an
  /// empty feature source. The new layer always becomes the active feature
  /// layer, last-added wins.
  ///
  /// # Errors
  /// [`RegistryError::DuplicateId`] if `options.id` is already registered.
  pub fn add_feature_layer(
    &mut self,
    options: LayerOptions,
  ) -> Result<LayerRecord, RegistryError> {
    let id = self.allocate_layer_id(options.id)?;
    let renderable = self.allocate_renderable();
    let name = name_or_default(&options.name, self.config.feature_layer_placeholder());
    let z_index = self.next_z_index(LayerKind::Feature);
    let record = LayerRecord::new(
      id,
      name,
      LayerKind::Feature,
      renderable,
      z_index,
      &options,
      Some(FeatureSet::new()),
    );

    match &mut self.binding {
      Binding::Unbound(queue) => {
        debug!("deferring feature layer '{}' ({id}) until bind", record.name());
        queue.enqueue(PendingAdd {
          record: record.clone(),
          silent: options.silent,
        })?;
      }
      Binding::Bound(_) => {
        self.apply_feature_layer(PendingAdd {
          record: record.clone(),
          silent: options.silent,
        });
      }
    }
    self.set_active(Some(id));
    Ok(record)
  }

  /// One-time transition to the bound state. Flushes deferred map layers,
  /// then deferred feature layers, each strictly FIFO, attaching every
  /// renderable exactly once. Repeated calls are no-ops; there is no way
  /// back to unbound.
  pub fn bind_host_map(&mut self, backend: Box<dyn RenderBackend>) {
    if matches!(self.binding, Binding::Bound(_)) {
      debug!("host map is already bound, ignoring repeated bind");
      return;
    }
    let previous = std::mem::replace(&mut self.binding, Binding::Bound(backend));
    let Binding::Unbound(mut queue) = previous else {
      return;
    };

    info!(
      "host map bound, flushing {} deferred map layers and {} deferred feature layers",
      queue.len(LayerKind::Map),
      queue.len(LayerKind::Feature)
    );
    queue.flush(LayerKind::Map, |add| self.apply_map_layer(add));
    queue.flush(LayerKind::Feature, |add| self.apply_feature_layer(add));
  }

  #[must_use]
  pub fn is_bound(&self) -> bool {
    matches!(self.binding, Binding::Bound(_))
  }

  /// Removes a catalogued map layer and detaches its renderable.
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if no catalogued map layer has this id.
  pub fn remove_map_layer(
    &mut self,
    id: LayerId,
    silent: bool,
  ) -> Result<LayerRecord, RegistryError> {
    let Some((position, _)) = self.map_layers.iter().find_position(|r| r.id() == id) else {
      return Err(RegistryError::NotFound {
        kind: LayerKind::Map,
        id,
      });
    };
    let record = self.map_layers.remove(position);
    if let Binding::Bound(backend) = &mut self.binding {
      backend.detach(record.renderable());
    }
    info!("map layer '{}' ({id}) removed", record.name());
    self.events.notify(&RegistryEvent::MapLayerRemoved {
      record: record.clone(),
      silent,
    });
    Ok(record)
  }

  /// Removes a catalogued feature layer: detaches its renderable, purges
  /// its features from the snap index, and if it was active, hands the
  /// active pointer to the most recently added remaining feature layer.
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if no catalogued feature layer has this id.
  pub fn remove_feature_layer(
    &mut self,
    id: LayerId,
    silent: bool,
  ) -> Result<LayerRecord, RegistryError> {
    let Some((position, _)) = self.feature_layers.iter().find_position(|r| r.id() == id) else {
      return Err(RegistryError::NotFound {
        kind: LayerKind::Feature,
        id,
      });
    };
    let record = self.feature_layers.remove(position);
    if let Some(source) = record.source() {
      self.snap_index.purge_source(source);
    }
    if let Binding::Bound(backend) = &mut self.binding {
      backend.detach(record.renderable());
    }
    info!("feature layer '{}' ({id}) removed", record.name());
    self.events.notify(&RegistryEvent::FeatureLayerRemoved {
      record: record.clone(),
      silent,
    });
    if self.active_feature_layer == Some(id) {
      let next = self.feature_layers.last().map(LayerRecord::id);
      self.set_active(next);
    }
    Ok(record)
  }

  /// The layer that newly created features go to by default. If no feature
  /// layer is active, one named `fallback_name` is synthesized first, so
  /// callers always have somewhere to place features.
  ///
  /// # Errors
  /// Only the synthesis path can fail, and only on a sealed queue, which
  /// the registry never produces itself.
  pub fn get_active_feature_layer(
    &mut self,
    fallback_name: &str,
  ) -> Result<LayerRecord, RegistryError> {
    if let Some(id) = self.active_feature_layer
      && let Some(record) = self.lookup_feature_layer(id)
    {
      return Ok(record.clone());
    }
    debug!("no active feature layer, synthesizing '{fallback_name}'");
    self.add_feature_layer(
      LayerOptions::default()
        .with_name(fallback_name)
        .with_dynamically_added(true),
    )
  }

  /// Explicit override of the active feature layer, including to `None`.
  /// Always emits [`RegistryEvent::ActiveFeatureLayerChanged`].
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if `id` names no known feature layer.
  pub fn set_active_feature_layer(&mut self, id: Option<LayerId>) -> Result<(), RegistryError> {
    if let Some(id) = id
      && self.lookup_feature_layer(id).is_none()
    {
      return Err(RegistryError::NotFound {
        kind: LayerKind::Feature,
        id,
      });
    }
    self.set_active(id);
    Ok(())
  }

  #[must_use]
  pub fn active_feature_layer(&self) -> Option<LayerId> {
    self.active_feature_layer
  }

  /// Looks up a catalogued record by id. Queued-but-unbound records are
  /// not queryable until the flush catalogues them.
  #[must_use]
  pub fn get_layer_by_id(&self, kind: LayerKind, id: LayerId) -> Option<&LayerRecord> {
    self.catalogue(kind).iter().find(|r| r.id() == id)
  }

  /// Reverse lookup: which catalogued layer owns this feature. Map layers
  /// are searched before feature layers, each in catalogue order, first
  /// match wins.
  #[must_use]
  pub fn get_owning_layer(&self, feature: FeatureId) -> Option<&LayerRecord> {
    self
      .map_layers
      .iter()
      .chain(&self.feature_layers)
      .find(|record| record.source().is_some_and(|s| s.contains(feature)))
  }

  /// Places a feature on a layer's source and mirrors it into the snap
  /// index. Idempotent per feature. Reaches queued records too, since
  /// callers may populate a layer they registered before bind.
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if `layer` names no known feature layer.
  pub fn add_feature(&mut self, layer: LayerId, feature: FeatureId) -> Result<(), RegistryError> {
    let inserted = {
      let record = self.record_mut(LayerKind::Feature, layer)?;
      record.source_mut().is_some_and(|s| s.add(feature))
    };
    if inserted {
      self.snap_index.add(feature);
      debug!("feature {feature} added to layer {layer}");
    }
    Ok(())
  }

  /// Removes a feature from a layer's source and from the snap index.
  /// No-op if the feature is absent.
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if `layer` names no known feature layer.
  pub fn remove_feature(
    &mut self,
    layer: LayerId,
    feature: FeatureId,
  ) -> Result<(), RegistryError> {
    let removed = {
      let record = self.record_mut(LayerKind::Feature, layer)?;
      record.source_mut().is_some_and(|s| s.remove(feature))
    };
    if removed {
      self.snap_index.remove(feature);
      debug!("feature {feature} removed from layer {layer}");
    }
    Ok(())
  }

  /// Places a feature on the active feature layer, synthesizing one named
  /// `fallback_name` if none is active. Returns the owning record.
  ///
  /// # Errors
  /// Propagates the synthesis errors of [`Self::get_active_feature_layer`].
  pub fn add_feature_to_active(
    &mut self,
    feature: FeatureId,
    fallback_name: &str,
  ) -> Result<LayerRecord, RegistryError> {
    let record = self.get_active_feature_layer(fallback_name)?;
    self.add_feature(record.id(), feature)?;
    Ok(record)
  }

  /// The snap index consumed by draw/edit snapping.
  #[must_use]
  pub fn snap_features(&self) -> &SnapIndex {
    &self.snap_index
  }

  /// Re-ranks a layer within its kind: `z = base_offset(kind) + ordinal`.
  /// The kinds' z ranges can never overlap.
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if `id` names no known layer of `kind`.
  pub fn set_z_index(
    &mut self,
    kind: LayerKind,
    id: LayerId,
    ordinal: u32,
  ) -> Result<(), RegistryError> {
    let z_index = kind.base_offset().saturating_add(ordinal);
    self.record_mut(kind, id)?.set_z_index(z_index);
    Ok(())
  }

  /// Renames a layer; blank names fall back to the configured placeholder.
  ///
  /// # Errors
  /// [`RegistryError::NotFound`] if `id` names no known layer of `kind`.
  pub fn set_name(
    &mut self,
    kind: LayerKind,
    id: LayerId,
    name: &str,
  ) -> Result<(), RegistryError> {
    let fallback = match kind {
      LayerKind::Map => self.config.map_layer_placeholder().to_owned(),
      LayerKind::Feature => self.config.feature_layer_placeholder().to_owned(),
    };
    let name = name_or_default(name, &fallback);
    self.record_mut(kind, id)?.set_name(name);
    Ok(())
  }

  /// # Errors
  /// [`RegistryError::NotFound`] if `id` names no known layer of `kind`.
  pub fn set_visible(
    &mut self,
    kind: LayerKind,
    id: LayerId,
    visible: bool,
  ) -> Result<(), RegistryError> {
    self.record_mut(kind, id)?.set_visible(visible);
    Ok(())
  }

  pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&RegistryEvent) + 'static) {
    self.events.subscribe(kind, handler);
  }

  #[must_use]
  pub fn map_layers(&self) -> &[LayerRecord] {
    &self.map_layers
  }

  #[must_use]
  pub fn feature_layers(&self) -> &[LayerRecord] {
    &self.feature_layers
  }

  /// Number of registrations still waiting for bind.
  #[must_use]
  pub fn deferred_count(&self, kind: LayerKind) -> usize {
    match &self.binding {
      Binding::Unbound(queue) => queue.len(kind),
      Binding::Bound(_) => 0,
    }
  }

  /// Full reset: detaches everything, empties both catalogues and any
  /// deferred registrations, clears the snap index, drops the active
  /// pointer.
  pub fn clear(&mut self) {
    match &mut self.binding {
      Binding::Unbound(queue) => *queue = PendingQueue::new(),
      Binding::Bound(backend) => {
        for record in self.map_layers.iter().chain(&self.feature_layers) {
          backend.detach(record.renderable());
        }
      }
    }
    let dropped = self.map_layers.len() + self.feature_layers.len();
    self.map_layers.clear();
    self.feature_layers.clear();
    self.snap_index.clear();
    if self.active_feature_layer.is_some() {
      self.set_active(None);
    }
    info!("registry cleared, {dropped} layers dropped");
  }

  fn apply_map_layer(&mut self, add: PendingAdd) {
    let PendingAdd { record, silent } = add;
    if let Binding::Bound(backend) = &mut self.binding {
      backend.attach(record.renderable());
    }
    debug!(
      "map layer '{}' ({}) catalogued at z {}",
      record.name(),
      record.id(),
      record.z_index()
    );
    self.map_layers.push(record.clone());
    self
      .events
      .notify(&RegistryEvent::MapLayerAdded { record, silent });
  }

  fn apply_feature_layer(&mut self, add: PendingAdd) {
    let PendingAdd { record, silent } = add;
    if let Binding::Bound(backend) = &mut self.binding {
      backend.attach(record.renderable());
    }
    debug!(
      "feature layer '{}' ({}) catalogued at z {}",
      record.name(),
      record.id(),
      record.z_index()
    );
    self.feature_layers.push(record.clone());
    self
      .events
      .notify(&RegistryEvent::FeatureLayerAdded { record, silent });
  }

  /// Moves the active pointer and always notifies.
  fn set_active(&mut self, id: Option<LayerId>) {
    self.active_feature_layer = id;
    let record = id.and_then(|id| self.lookup_feature_layer(id).cloned());
    self
      .events
      .notify(&RegistryEvent::ActiveFeatureLayerChanged { record });
  }

  /// Feature layer lookup spanning the catalogue and, before bind, the
  /// deferred queue.
  fn lookup_feature_layer(&self, id: LayerId) -> Option<&LayerRecord> {
    self
      .feature_layers
      .iter()
      .find(|r| r.id() == id)
      .or_else(|| match &self.binding {
        Binding::Unbound(queue) => queue.find(LayerKind::Feature, id),
        Binding::Bound(_) => None,
      })
  }

  /// Mutable record lookup spanning the catalogue and, before bind, the
  /// deferred queue. Setters reach records their creator holds pre-bind.
  fn record_mut(
    &mut self,
    kind: LayerKind,
    id: LayerId,
  ) -> Result<&mut LayerRecord, RegistryError> {
    let in_catalogue = self.catalogue(kind).iter().any(|r| r.id() == id);
    if in_catalogue {
      let catalogue = match kind {
        LayerKind::Map => &mut self.map_layers,
        LayerKind::Feature => &mut self.feature_layers,
      };
      return catalogue
        .iter_mut()
        .find(|r| r.id() == id)
        .ok_or(RegistryError::NotFound { kind, id });
    }
    match &mut self.binding {
      Binding::Unbound(queue) => queue
        .find_mut(kind, id)
        .ok_or(RegistryError::NotFound { kind, id }),
      Binding::Bound(_) => Err(RegistryError::NotFound { kind, id }),
    }
  }

  fn catalogue(&self, kind: LayerKind) -> &[LayerRecord] {
    match kind {
      LayerKind::Map => &self.map_layers,
      LayerKind::Feature => &self.feature_layers,
    }
  }

  fn allocate_layer_id(&mut self, explicit: Option<LayerId>) -> Result<LayerId, RegistryError> {
    if let Some(id) = explicit {
      if self.id_in_use(id) {
        return Err(RegistryError::DuplicateId { id });
      }
      self.next_layer_id = self.next_layer_id.max(id.0 + 1);
      return Ok(id);
    }
    let id = LayerId(self.next_layer_id);
    self.next_layer_id += 1;
    Ok(id)
  }

  fn id_in_use(&self, id: LayerId) -> bool {
    self
      .map_layers
      .iter()
      .chain(&self.feature_layers)
      .any(|r| r.id() == id)
      || matches!(&self.binding, Binding::Unbound(queue) if queue.contains_id(id))
  }

  fn allocate_renderable(&mut self) -> RenderableHandle {
    let handle = RenderableHandle(self.next_renderable);
    self.next_renderable += 1;
    handle
  }

  /// Position-derived z for the next layer of a kind: base offset plus the
  /// number of layers that will precede it once applied.
  fn next_z_index(&self, kind: LayerKind) -> u32 {
    let position = match &self.binding {
      Binding::Unbound(queue) => queue.len(kind),
      Binding::Bound(_) => self.catalogue(kind).len(),
    };
    kind
      .base_offset()
      .saturating_add(u32::try_from(position).unwrap_or(u32::MAX))
  }
}
