use crate::registry::RenderableHandle;

/// Boundary to the rendering collaborator, the component that actually
/// paints layers and features.
///
/// The registry drives it with opaque handles: each catalogued layer is
/// attached exactly once (directly when the registry is bound, at flush
/// time otherwise) and detached on removal. Everything visual stays on the
/// other side of this trait.
pub trait RenderBackend {
  fn attach(&mut self, renderable: RenderableHandle);
  fn detach(&mut self, renderable: RenderableHandle);
}

/// Backend that draws nothing. Useful for headless use and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl RenderBackend for NoopBackend {
  fn attach(&mut self, _renderable: RenderableHandle) {}
  fn detach(&mut self, _renderable: RenderableHandle) {}
}
