use std::collections::VecDeque;

use super::RegistryError;
use super::record::{LayerId, LayerKind, LayerRecord};

/// One deferred registration, waiting for the host map to be bound.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAdd {
  pub record: LayerRecord,
  /// Forwarded into the added event emitted when the add is applied.
  pub silent: bool,
}

/// Buffers add requests issued before the host map exists.
///
/// Tool constructors run before the map instance is available, so the
/// registry accepts registrations at any time and replays them once bound.
/// Two independent FIFOs, one per layer kind; each is flushed exactly once
/// and is sealed afterwards. Enqueueing into a sealed FIFO is an error, not
/// a silent drop.
#[derive(Debug, Default)]
pub struct PendingQueue {
  map_layers: VecDeque<PendingAdd>,
  feature_layers: VecDeque<PendingAdd>,
  sealed_map: bool,
  sealed_feature: bool,
}

impl PendingQueue {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a deferred add to the FIFO of the record's kind.
  ///
  /// # Errors
  /// [`RegistryError::QueueSealed`] if that kind has already been flushed.
  pub fn enqueue(&mut self, add: PendingAdd) -> Result<(), RegistryError> {
    let kind = add.record.kind();
    if self.is_sealed(kind) {
      return Err(RegistryError::QueueSealed);
    }
    self.fifo_mut(kind).push_back(add);
    Ok(())
  }

  /// Drains one kind's FIFO in original call order, invoking `apply` per
  /// entry, then seals it. Flushing an already empty FIFO only seals.
  pub fn flush(&mut self, kind: LayerKind, mut apply: impl FnMut(PendingAdd)) {
    while let Some(add) = self.fifo_mut(kind).pop_front() {
      apply(add);
    }
    match kind {
      LayerKind::Map => self.sealed_map = true,
      LayerKind::Feature => self.sealed_feature = true,
    }
  }

  #[must_use]
  pub fn is_sealed(&self, kind: LayerKind) -> bool {
    match kind {
      LayerKind::Map => self.sealed_map,
      LayerKind::Feature => self.sealed_feature,
    }
  }

  #[must_use]
  pub fn len(&self, kind: LayerKind) -> usize {
    self.fifo(kind).len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.map_layers.is_empty() && self.feature_layers.is_empty()
  }

  /// Whether any queued record carries this id, regardless of kind.
  #[must_use]
  pub fn contains_id(&self, id: LayerId) -> bool {
    self
      .map_layers
      .iter()
      .chain(&self.feature_layers)
      .any(|add| add.record.id() == id)
  }

  #[must_use]
  pub fn find(&self, kind: LayerKind, id: LayerId) -> Option<&LayerRecord> {
    self
      .fifo(kind)
      .iter()
      .map(|add| &add.record)
      .find(|record| record.id() == id)
  }

  pub fn find_mut(&mut self, kind: LayerKind, id: LayerId) -> Option<&mut LayerRecord> {
    self
      .fifo_mut(kind)
      .iter_mut()
      .map(|add| &mut add.record)
      .find(|record| record.id() == id)
  }

  fn fifo(&self, kind: LayerKind) -> &VecDeque<PendingAdd> {
    match kind {
      LayerKind::Map => &self.map_layers,
      LayerKind::Feature => &self.feature_layers,
    }
  }

  fn fifo_mut(&mut self, kind: LayerKind) -> &mut VecDeque<PendingAdd> {
    match kind {
      LayerKind::Map => &mut self.map_layers,
      LayerKind::Feature => &mut self.feature_layers,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::record::{LayerOptions, RenderableHandle};

  fn record(id: u64, kind: LayerKind) -> LayerRecord {
    LayerRecord::new(
      LayerId(id),
      format!("layer {id}"),
      kind,
      RenderableHandle(id),
      kind.base_offset(),
      &LayerOptions::default(),
      None,
    )
  }

  fn add(id: u64, kind: LayerKind) -> PendingAdd {
    PendingAdd {
      record: record(id, kind),
      silent: false,
    }
  }

  #[test]
  fn test_flush_preserves_fifo_order() {
    let mut queue = PendingQueue::new();
    for id in [3, 1, 2] {
      queue.enqueue(add(id, LayerKind::Map)).unwrap();
    }

    let mut seen = Vec::new();
    queue.flush(LayerKind::Map, |add| seen.push(add.record.id()));
    assert_eq!(seen, vec![LayerId(3), LayerId(1), LayerId(2)]);
    assert_eq!(queue.len(LayerKind::Map), 0);
  }

  #[test]
  fn test_kinds_are_independent() {
    let mut queue = PendingQueue::new();
    queue.enqueue(add(1, LayerKind::Map)).unwrap();
    queue.enqueue(add(2, LayerKind::Feature)).unwrap();

    queue.flush(LayerKind::Map, |_| {});
    assert!(queue.is_sealed(LayerKind::Map));
    assert!(!queue.is_sealed(LayerKind::Feature));
    assert_eq!(queue.len(LayerKind::Feature), 1);
  }

  #[test]
  fn test_flush_empty_is_noop() {
    let mut queue = PendingQueue::new();
    let mut applied = 0;
    queue.flush(LayerKind::Feature, |_| applied += 1);
    assert_eq!(applied, 0);
  }

  #[test]
  fn test_enqueue_after_flush_is_an_error() {
    let mut queue = PendingQueue::new();
    queue.flush(LayerKind::Map, |_| {});
    let result = queue.enqueue(add(1, LayerKind::Map));
    assert_eq!(result, Err(RegistryError::QueueSealed));
    // The other kind is still open.
    assert!(queue.enqueue(add(2, LayerKind::Feature)).is_ok());
  }

  #[test]
  fn test_contains_id_spans_both_kinds() {
    let mut queue = PendingQueue::new();
    queue.enqueue(add(1, LayerKind::Map)).unwrap();
    queue.enqueue(add(2, LayerKind::Feature)).unwrap();
    assert!(queue.contains_id(LayerId(1)));
    assert!(queue.contains_id(LayerId(2)));
    assert!(!queue.contains_id(LayerId(3)));
  }
}
