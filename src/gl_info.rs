// glthread/src/gl_info.rs
//
//! Read-only queries against a GL function table.

use glow::HasContext;

/// The subset of GL that the render thread itself needs: the renderer string, for the driver
/// probe, and the error flag, for `DebugFlags::CHECK_GL_ERROR`.
pub trait GlInfo {
    /// `glGetString(GL_RENDERER)`.
    fn renderer(&self) -> String;
    /// `glGetError()`. Zero means no error.
    fn error(&self) -> u32;
}

impl GlInfo for glow::Context {
    fn renderer(&self) -> String {
        unsafe { self.get_parameter_string(glow::RENDERER) }
    }

    fn error(&self) -> u32 {
        unsafe { self.get_error() }
    }
}
