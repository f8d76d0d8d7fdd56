// glthread/src/factories.rs
//
//! Pluggable collaborators that create the native objects of a render thread, and their
//! default implementations.

use crate::context::ClientVersion;
use crate::device::{ConfigAttrib, ConfigSpec, Egl, OPENGL_ES2_BIT};
use crate::{Error, WindowingApiError};

use log::{debug, error, warn};

/// Creates and destroys contexts.
///
/// Both methods run on the render thread while it holds the `ContextArbiter` monitor, so they
/// must not call back into the arbiter or into any render thread sharing it.
pub trait ContextFactory<E: Egl>: Send + Sync {
    fn create_context(
        &self,
        egl: &E,
        display: &E::Display,
        config: &E::Config,
        client_version: &ClientVersion,
    ) -> Result<E::Context, Error>;

    fn destroy_context(
        &self,
        egl: &E,
        display: &E::Display,
        context: E::Context,
    ) -> Result<(), Error>;
}

/// Creates and destroys window surfaces.
///
/// `destroy_surface` may run while the render thread holds the `ContextArbiter` monitor and
/// must not call back into the arbiter or into any render thread sharing it.
pub trait WindowSurfaceFactory<E: Egl>: Send + Sync {
    /// Returns `None` if the native window cannot currently back a surface, for example because
    /// it has been torn down without the owner having been notified yet.
    fn create_window_surface(
        &self,
        egl: &E,
        display: &E::Display,
        config: &E::Config,
        native_window: &E::NativeWindow,
    ) -> Option<E::Surface>;

    fn destroy_surface(&self, egl: &E, display: &E::Display, surface: E::Surface);
}

/// Picks the framebuffer config a context is created with.
///
/// Called on the render thread while it holds the `ContextArbiter` monitor. Implementations
/// must not call back into the arbiter or into any render thread sharing it.
pub trait ConfigChooser<E: Egl>: Send + Sync {
    fn choose_config(
        &self,
        egl: &E,
        display: &E::Display,
        client_version: u8,
    ) -> Result<E::Config, Error>;
}

/// Creates a context of the requested client version, falling back to GLES 2 if a later
/// version is unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultContextFactory;

impl<E: Egl> ContextFactory<E> for DefaultContextFactory {
    fn create_context(
        &self,
        egl: &E,
        display: &E::Display,
        config: &E::Config,
        client_version: &ClientVersion,
    ) -> Result<E::Context, Error> {
        loop {
            let version = client_version.get();
            let requested = if version != 0 { Some(version) } else { None };
            match egl.create_context(display, config, requested) {
                Ok(context) => {
                    debug!("Returning a GLES {} context", version);
                    return Ok(context);
                }
                Err(err) if version > 2 => {
                    warn!("Creating a GLES {} context failed ({:?}), falling back to GLES 2", version, err);
                    client_version.set(2);
                }
                Err(err) => return Err(Error::ContextCreationFailed(err)),
            }
        }
    }

    fn destroy_context(
        &self,
        egl: &E,
        display: &E::Display,
        context: E::Context,
    ) -> Result<(), Error> {
        egl.destroy_context(display, context)
            .map_err(Error::ContextDestructionFailed)
    }
}

/// Creates window surfaces directly from the native window.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultWindowSurfaceFactory;

impl<E: Egl> WindowSurfaceFactory<E> for DefaultWindowSurfaceFactory {
    fn create_window_surface(
        &self,
        egl: &E,
        display: &E::Display,
        config: &E::Config,
        native_window: &E::NativeWindow,
    ) -> Option<E::Surface> {
        match egl.create_window_surface(display, config, native_window) {
            Ok(surface) => Some(surface),
            Err(WindowingApiError::BadNativeWindow) => {
                // The native window has been torn down but the owner hasn't been told yet.
                warn!("createWindowSurface returned EGL_BAD_NATIVE_WINDOW");
                None
            }
            Err(err) => {
                error!("eglCreateWindowSurface failed: {:?}", err);
                None
            }
        }
    }

    fn destroy_surface(&self, egl: &E, display: &E::Display, surface: E::Surface) {
        if let Err(err) = egl.destroy_surface(display, surface) {
            warn!("eglDestroySurface failed: {:?}", err);
        }
    }
}

/// Chooses the first config with exactly the requested color channel sizes and at least the
/// requested depth and stencil sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentSizeChooser {
    pub red_size: i32,
    pub green_size: i32,
    pub blue_size: i32,
    pub alpha_size: i32,
    pub depth_size: i32,
    pub stencil_size: i32,
}

impl ComponentSizeChooser {
    pub fn new(
        red_size: i32,
        green_size: i32,
        blue_size: i32,
        alpha_size: i32,
        depth_size: i32,
        stencil_size: i32,
    ) -> ComponentSizeChooser {
        ComponentSizeChooser {
            red_size,
            green_size,
            blue_size,
            alpha_size,
            depth_size,
            stencil_size,
        }
    }

    /// An RGB888 config, with a 16-bit depth buffer if `with_depth_buffer` is set.
    pub fn simple(with_depth_buffer: bool) -> ComponentSizeChooser {
        ComponentSizeChooser::new(8, 8, 8, 0, if with_depth_buffer { 16 } else { 0 }, 0)
    }

    /// The attributes passed to `choose_configs`.
    pub fn config_spec(&self, client_version: u8) -> ConfigSpec {
        let spec = ConfigSpec::new()
            .with(ConfigAttrib::RedSize, self.red_size)
            .with(ConfigAttrib::GreenSize, self.green_size)
            .with(ConfigAttrib::BlueSize, self.blue_size)
            .with(ConfigAttrib::AlphaSize, self.alpha_size)
            .with(ConfigAttrib::DepthSize, self.depth_size)
            .with(ConfigAttrib::StencilSize, self.stencil_size);
        if client_version == 2 {
            spec.with(ConfigAttrib::RenderableType, OPENGL_ES2_BIT)
        } else {
            spec
        }
    }

    fn matches<E: Egl>(&self, egl: &E, display: &E::Display, config: &E::Config) -> bool {
        let attrib = |attrib| egl.config_attrib(display, config, attrib).unwrap_or(0);
        attrib(ConfigAttrib::DepthSize) >= self.depth_size
            && attrib(ConfigAttrib::StencilSize) >= self.stencil_size
            && attrib(ConfigAttrib::RedSize) == self.red_size
            && attrib(ConfigAttrib::GreenSize) == self.green_size
            && attrib(ConfigAttrib::BlueSize) == self.blue_size
            && attrib(ConfigAttrib::AlphaSize) == self.alpha_size
    }
}

impl<E: Egl> ConfigChooser<E> for ComponentSizeChooser {
    fn choose_config(
        &self,
        egl: &E,
        display: &E::Display,
        client_version: u8,
    ) -> Result<E::Config, Error> {
        let spec = self.config_spec(client_version);
        let configs = egl
            .choose_configs(display, &spec)
            .map_err(Error::PixelFormatSelectionFailed)?;
        if configs.is_empty() {
            return Err(Error::NoPixelFormatFound);
        }
        configs
            .into_iter()
            .find(|config| self.matches(egl, display, config))
            .ok_or(Error::NoPixelFormatFound)
    }
}
