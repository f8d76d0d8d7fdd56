// glthread/src/renderer.rs
//
//! The drawing callbacks invoked by the render thread.

use crate::device::Egl;

/// Application drawing logic.
///
/// All methods are called on the render thread with the context current. After a context
/// loss, `on_surface_created` is called again.
pub trait Renderer<E: Egl>: Send {
    /// Called when a context has been created, before the first frame drawn with it.
    fn on_surface_created(&mut self, gl: &E::Gl, config: &E::Config);

    /// Called after the surface has been created and whenever its size changes.
    fn on_surface_changed(&mut self, gl: &E::Gl, width: i32, height: i32);

    /// Called once per frame.
    fn on_draw_frame(&mut self, gl: &E::Gl);
}
