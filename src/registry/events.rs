use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::error;
use serde::{Deserialize, Serialize};

use super::record::LayerRecord;

/// Subscription key for [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  MapLayerAdded,
  MapLayerRemoved,
  FeatureLayerAdded,
  FeatureLayerRemoved,
  ActiveFeatureLayerChanged,
}

/// A registry mutation, broadcast after the mutation has been committed.
///
/// `silent` is carried through from the registration/removal options for
/// subscribers to interpret; it never suppresses delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryEvent {
  MapLayerAdded { record: LayerRecord, silent: bool },
  MapLayerRemoved { record: LayerRecord, silent: bool },
  FeatureLayerAdded { record: LayerRecord, silent: bool },
  FeatureLayerRemoved { record: LayerRecord, silent: bool },
  ActiveFeatureLayerChanged { record: Option<LayerRecord> },
}

impl RegistryEvent {
  #[must_use]
  pub fn kind(&self) -> EventKind {
    match self {
      RegistryEvent::MapLayerAdded { .. } => EventKind::MapLayerAdded,
      RegistryEvent::MapLayerRemoved { .. } => EventKind::MapLayerRemoved,
      RegistryEvent::FeatureLayerAdded { .. } => EventKind::FeatureLayerAdded,
      RegistryEvent::FeatureLayerRemoved { .. } => EventKind::FeatureLayerRemoved,
      RegistryEvent::ActiveFeatureLayerChanged { .. } => EventKind::ActiveFeatureLayerChanged,
    }
  }
}

type Handler = Box<dyn FnMut(&RegistryEvent)>;

/// Synchronous pub/sub for registry mutations.
///
/// Handlers run on the caller's execution context, in registration order
/// per event kind. A panicking handler is caught and logged so it can
/// neither starve sibling handlers nor roll back the committed mutation
/// that triggered the notification.
#[derive(Default)]
pub struct EventBus {
  handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventBus {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&RegistryEvent) + 'static) {
    self
      .handlers
      .entry(kind)
      .or_default()
      .push(Box::new(handler));
  }

  pub fn notify(&mut self, event: &RegistryEvent) {
    let Some(handlers) = self.handlers.get_mut(&event.kind()) else {
      return;
    };
    for handler in handlers {
      if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
        error!(
          "a subscriber to {:?} panicked; continuing with the remaining subscribers",
          event.kind()
        );
      }
    }
  }

  #[must_use]
  pub fn subscriber_count(&self, kind: EventKind) -> usize {
    self.handlers.get(&kind).map_or(0, Vec::len)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use super::*;
  use crate::registry::record::{LayerId, LayerKind, LayerOptions, RenderableHandle};

  fn record() -> LayerRecord {
    LayerRecord::new(
      LayerId(1),
      "test".to_owned(),
      LayerKind::Map,
      RenderableHandle(1),
      1,
      &LayerOptions::default(),
      None,
    )
  }

  #[test]
  fn test_handlers_run_in_registration_order() {
    let mut bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    for tag in 0..3 {
      let seen = seen.clone();
      bus.subscribe(EventKind::MapLayerAdded, move |_| {
        seen.borrow_mut().push(tag);
      });
    }

    bus.notify(&RegistryEvent::MapLayerAdded {
      record: record(),
      silent: false,
    });
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
  }

  #[test]
  fn test_kinds_are_routed_separately() {
    let mut bus = EventBus::new();
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    bus.subscribe(EventKind::MapLayerRemoved, move |_| {
      *counter.borrow_mut() += 1;
    });

    bus.notify(&RegistryEvent::MapLayerAdded {
      record: record(),
      silent: false,
    });
    assert_eq!(*calls.borrow(), 0);
    bus.notify(&RegistryEvent::MapLayerRemoved {
      record: record(),
      silent: false,
    });
    assert_eq!(*calls.borrow(), 1);
  }

  #[test]
  fn test_panicking_handler_is_isolated() {
    let mut bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let first = seen.clone();
    bus.subscribe(EventKind::MapLayerAdded, move |_| {
      first.borrow_mut().push("first");
    });
    bus.subscribe(EventKind::MapLayerAdded, |_| panic!("broken tool"));
    let last = seen.clone();
    bus.subscribe(EventKind::MapLayerAdded, move |_| {
      last.borrow_mut().push("last");
    });

    bus.notify(&RegistryEvent::MapLayerAdded {
      record: record(),
      silent: false,
    });
    assert_eq!(*seen.borrow(), vec!["first", "last"]);
  }

  #[test]
  fn test_silent_flag_reaches_subscribers_unchanged() {
    let mut bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(EventKind::FeatureLayerAdded, move |event| {
      if let RegistryEvent::FeatureLayerAdded { silent, .. } = event {
        sink.borrow_mut().push(*silent);
      }
    });

    let feature_record = LayerRecord::new(
      LayerId(2),
      "drawings".to_owned(),
      LayerKind::Feature,
      RenderableHandle(2),
      LayerKind::Feature.base_offset(),
      &LayerOptions::default(),
      None,
    );
    bus.notify(&RegistryEvent::FeatureLayerAdded {
      record: feature_record,
      silent: true,
    });
    assert_eq!(*seen.borrow(), vec![true]);
  }
}
