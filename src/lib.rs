//! A dedicated GL render thread that manages the lifecycle of a native context and surface.
//!
//! A `SurfaceOwner` sits on the UI side and forwards the host's lifecycle events (surface
//! available, resized, destroyed, activity paused and resumed, view attached and detached) to
//! a `RenderWorker`. The worker runs on its own thread, creates and tears down the native
//! display, context and window surface through an `Egl` implementation as those events
//! require, and calls the application's `Renderer` to draw frames.
//!
//! Some drivers can only support one context per process. Render threads sharing a
//! `ContextArbiter` coordinate so that at most one of them holds a context on such drivers.

pub mod platform;
pub use platform::headless::{HeadlessEgl, HeadlessWindow};

pub mod error;
pub use crate::error::{Error, ToWindowingApiError, WindowingApiError};

mod arbiter;
pub use crate::arbiter::{ContextArbiter, WorkerId};

mod context;
pub use crate::context::{ClientVersion, DebugFlags};

pub mod device;
pub use crate::device::{ConfigAttrib, ConfigSpec, Egl};

pub mod factories;
pub use crate::factories::{ComponentSizeChooser, ConfigChooser, ContextFactory};
pub use crate::factories::{DefaultContextFactory, DefaultWindowSurfaceFactory};
pub use crate::factories::WindowSurfaceFactory;

mod gl_info;
pub use crate::gl_info::GlInfo;

mod owner;
pub use crate::owner::SurfaceOwner;

mod renderer;
pub use crate::renderer::Renderer;

mod surface_context;
pub use crate::surface_context::SurfaceContext;

mod worker;
pub use crate::worker::{RenderMode, RenderPhase, RenderWorker, WorkerStatus};

#[cfg(test)]
mod tests;
