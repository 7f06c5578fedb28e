pub mod config;
pub mod registry;
pub mod render;

pub use registry::{
  EventKind, FeatureId, LayerId, LayerKind, LayerOptions, LayerRecord, LayerRegistry,
  RegistryError, RegistryEvent,
};
pub use render::RenderBackend;
