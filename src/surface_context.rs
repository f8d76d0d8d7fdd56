// glthread/src/surface_context.rs
//
//! The native display, config, context and surface owned by one render thread.

use crate::device::Egl;
use crate::factories::{ContextFactory, WindowSurfaceFactory};
use crate::owner::OwnerShared;
use crate::{Error, WindowingApiError};

use log::{debug, warn};
use std::sync::{Arc, Weak};

/// Wraps the native handles of one render thread.
///
/// A surface only ever exists while a context does. Teardown methods may be called any number of
/// times.
pub struct SurfaceContext<E: Egl> {
    egl: Arc<E>,
    owner: Weak<OwnerShared<E>>,
    display: Option<E::Display>,
    config: Option<E::Config>,
    context: Option<(E::Context, Arc<dyn ContextFactory<E>>)>,
    surface: Option<(E::Surface, Arc<dyn WindowSurfaceFactory<E>>)>,
}

impl<E: Egl> SurfaceContext<E> {
    pub(crate) fn new(egl: Arc<E>, owner: Weak<OwnerShared<E>>) -> SurfaceContext<E> {
        SurfaceContext {
            egl,
            owner,
            display: None,
            config: None,
            context: None,
            surface: None,
        }
    }

    /// Initializes the display, chooses a config and creates a context.
    pub fn start(&mut self) -> Result<(), Error> {
        debug!("start() tid={:?}", std::thread::current().id());
        let display = self.egl.get_display().map_err(Error::ConnectionFailed)?;
        self.egl
            .initialize(&display)
            .map_err(Error::InitializationFailed)?;
        self.display = Some(display.clone());

        let owner = match self.owner.upgrade() {
            Some(owner) => owner,
            None => {
                self.config = None;
                self.context = None;
                return Err(Error::NoOwner);
            }
        };

        let (config_chooser, context_factory) = {
            let config = owner.config();
            (config.config_chooser.clone(), config.context_factory.clone())
        };
        let config =
            config_chooser.choose_config(&*self.egl, &display, owner.client_version.get())?;
        let context = context_factory.create_context(
            &*self.egl,
            &display,
            &config,
            &owner.client_version,
        )?;
        self.config = Some(config);
        self.context = Some((context, context_factory));
        self.surface = None;
        Ok(())
    }

    /// Creates a window surface for the owner's current native window, replacing any existing
    /// one, and makes the context current on it.
    ///
    /// Returns false if the native window cannot back a surface right now.
    pub fn create_surface(&mut self) -> bool {
        debug!("createSurface() tid={:?}", std::thread::current().id());
        self.destroy_surface_imp();

        let (display, config) = match (&self.display, &self.config, &self.context) {
            (Some(display), Some(config), Some(_)) => (display.clone(), config.clone()),
            _ => {
                warn!("createSurface() called without a started context");
                return false;
            }
        };

        let owner = match self.owner.upgrade() {
            Some(owner) => owner,
            None => return false,
        };
        let native_window = match owner.native_window() {
            Some(native_window) => native_window,
            None => {
                warn!("createSurface() called without a native window");
                return false;
            }
        };
        let factory = owner.config().window_surface_factory.clone();
        let surface =
            match factory.create_window_surface(&*self.egl, &display, &config, &native_window) {
                Some(surface) => surface,
                None => return false,
            };

        let made_current = match self.context {
            Some((ref context, _)) => self.egl.make_current(&display, Some((&surface, context))),
            None => Err(WindowingApiError::BadContext),
        };
        self.surface = Some((surface, factory));
        if let Err(err) = made_current {
            // Most likely the underlying window has been destroyed.
            warn!("eglMakeCurrent failed: {:?}", err);
            return false;
        }
        true
    }

    /// Returns the GL function table for the current context.
    pub fn create_gl(&self) -> Option<E::Gl> {
        self.context
            .as_ref()
            .map(|(context, _)| self.egl.create_gl(context))
    }

    /// Presents the current surface.
    pub fn swap(&self) -> Result<(), WindowingApiError> {
        match (&self.display, &self.surface) {
            (Some(display), Some((surface, _))) => self.egl.swap_buffers(display, surface),
            _ => Err(WindowingApiError::BadSurface),
        }
    }

    pub fn destroy_surface(&mut self) {
        debug!("destroySurface() tid={:?}", std::thread::current().id());
        self.destroy_surface_imp();
    }

    fn destroy_surface_imp(&mut self) {
        if let Some((surface, factory)) = self.surface.take() {
            if let Some(ref display) = self.display {
                if let Err(err) = self.egl.make_current(display, None) {
                    warn!("eglMakeCurrent(NO_SURFACE) failed: {:?}", err);
                }
                factory.destroy_surface(&*self.egl, display, surface);
            }
        }
    }

    /// Destroys the surface and context and terminates the display.
    pub fn finish(&mut self) {
        debug!("finish() tid={:?}", std::thread::current().id());
        self.destroy_surface_imp();
        if let Some((context, factory)) = self.context.take() {
            if let Some(ref display) = self.display {
                if let Err(err) = factory.destroy_context(&*self.egl, display, context) {
                    warn!("destroyContext failed: {:?}", err);
                }
            }
        }
        if let Some(display) = self.display.take() {
            self.egl.terminate(&display);
        }
    }

    #[inline]
    pub fn config(&self) -> Option<&E::Config> {
        self.config.as_ref()
    }

    #[inline]
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    #[inline]
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }
}

impl<E: Egl> Drop for SurfaceContext<E> {
    fn drop(&mut self) {
        self.finish();
    }
}
