// glthread/src/owner.rs
//
//! The UI-facing object that owns a render thread.

use crate::arbiter::ContextArbiter;
use crate::context::{AtomicDebugFlags, ClientVersion, DebugFlags};
use crate::device::Egl;
use crate::factories::{ComponentSizeChooser, ConfigChooser, ContextFactory};
use crate::factories::{DefaultContextFactory, DefaultWindowSurfaceFactory, WindowSurfaceFactory};
use crate::renderer::Renderer;
use crate::worker::{RenderMode, RenderWorker, WorkerStatus};
use crate::Error;

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const NO_RENDERER: &str = "set_renderer() must be called before controlling the render thread";

pub(crate) struct OwnerConfig<E: Egl> {
    pub(crate) context_factory: Arc<dyn ContextFactory<E>>,
    pub(crate) config_chooser: Arc<dyn ConfigChooser<E>>,
    pub(crate) window_surface_factory: Arc<dyn WindowSurfaceFactory<E>>,
}

// What the render thread reaches through its weak back-reference.
pub(crate) struct OwnerShared<E: Egl> {
    config: Mutex<OwnerConfig<E>>,
    pub(crate) renderer: Mutex<Option<Box<dyn Renderer<E>>>>,
    native_window: Mutex<Option<E::NativeWindow>>,
    pub(crate) client_version: ClientVersion,
    pub(crate) preserve_context_on_pause: AtomicBool,
    pub(crate) debug_flags: AtomicDebugFlags,
}

impl<E: Egl> OwnerShared<E> {
    pub(crate) fn config(&self) -> MutexGuard<'_, OwnerConfig<E>> {
        self.config.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn native_window(&self) -> Option<E::NativeWindow> {
        self.native_window
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    fn set_native_window(&self, native_window: Option<E::NativeWindow>) {
        *self.native_window.lock().unwrap_or_else(|err| err.into_inner()) = native_window;
    }

    fn has_renderer(&self) -> bool {
        self.renderer
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .is_some()
    }
}

/// Owns the renderer, the native configuration and the render thread of one drawable view.
///
/// The host forwards its surface and window lifecycle events to the `on_*` methods. Configuration
/// setters must be called before `set_renderer`, which starts the render thread.
pub struct SurfaceOwner<E: Egl> {
    egl: Arc<E>,
    arbiter: Arc<ContextArbiter>,
    shared: Arc<OwnerShared<E>>,
    worker: Option<RenderWorker<E>>,
    detached: bool,
}

impl<E: Egl> SurfaceOwner<E> {
    /// Creates an owner that will request contexts of `client_version` (0 for the driver
    /// default). By default the config chooser picks RGB565 with a 16-bit depth buffer.
    pub fn new(egl: Arc<E>, arbiter: Arc<ContextArbiter>, client_version: u8) -> SurfaceOwner<E> {
        let config = OwnerConfig {
            context_factory: Arc::new(DefaultContextFactory),
            config_chooser: Arc::new(ComponentSizeChooser::new(5, 6, 5, 0, 16, 0)),
            window_surface_factory: Arc::new(DefaultWindowSurfaceFactory),
        };
        SurfaceOwner {
            egl,
            arbiter,
            shared: Arc::new(OwnerShared {
                config: Mutex::new(config),
                renderer: Mutex::new(None),
                native_window: Mutex::new(None),
                client_version: ClientVersion::new(client_version),
                preserve_context_on_pause: AtomicBool::new(false),
                debug_flags: AtomicDebugFlags::default(),
            }),
            worker: None,
            detached: false,
        }
    }

    fn check_render_thread_state(&self) -> Result<(), Error> {
        if self.worker.is_some() {
            return Err(Error::RenderThreadAlreadyStarted);
        }
        Ok(())
    }

    fn worker(&self) -> &RenderWorker<E> {
        self.worker.as_ref().expect(NO_RENDERER)
    }

    pub fn set_context_factory<F>(&mut self, factory: F) -> Result<(), Error>
    where
        F: ContextFactory<E> + 'static,
    {
        self.check_render_thread_state()?;
        self.shared.config().context_factory = Arc::new(factory);
        Ok(())
    }

    pub fn set_window_surface_factory<F>(&mut self, factory: F) -> Result<(), Error>
    where
        F: WindowSurfaceFactory<E> + 'static,
    {
        self.check_render_thread_state()?;
        self.shared.config().window_surface_factory = Arc::new(factory);
        Ok(())
    }

    pub fn set_config_chooser<C>(&mut self, chooser: C) -> Result<(), Error>
    where
        C: ConfigChooser<E> + 'static,
    {
        self.check_render_thread_state()?;
        self.shared.config().config_chooser = Arc::new(chooser);
        Ok(())
    }

    /// Chooses an RGB888 config, with a 16-bit depth buffer if `need_depth` is set.
    pub fn set_config_chooser_depth(&mut self, need_depth: bool) -> Result<(), Error> {
        self.set_config_chooser(ComponentSizeChooser::simple(need_depth))
    }

    /// Chooses a config with exactly the given color sizes and at least the given depth and
    /// stencil sizes.
    pub fn set_config_chooser_sizes(
        &mut self,
        red_size: i32,
        green_size: i32,
        blue_size: i32,
        alpha_size: i32,
        depth_size: i32,
        stencil_size: i32,
    ) -> Result<(), Error> {
        self.set_config_chooser(ComponentSizeChooser::new(
            red_size,
            green_size,
            blue_size,
            alpha_size,
            depth_size,
            stencil_size,
        ))
    }

    pub fn set_context_client_version(&mut self, version: u8) -> Result<(), Error> {
        self.check_render_thread_state()?;
        self.shared.client_version.set(version);
        Ok(())
    }

    /// The client version contexts are created with. Reflects any fallback the context factory
    /// performed.
    #[inline]
    pub fn client_version(&self) -> u8 {
        self.shared.client_version.get()
    }

    /// Installs the renderer and starts the render thread. May only be called once.
    pub fn set_renderer<R>(&mut self, renderer: R) -> Result<(), Error>
    where
        R: Renderer<E> + 'static,
    {
        self.check_render_thread_state()?;
        *self.shared.renderer.lock().unwrap_or_else(|err| err.into_inner()) =
            Some(Box::new(renderer));
        let mut worker = self.create_worker(RenderMode::Continuously);
        worker.start()?;
        self.worker = Some(worker);
        Ok(())
    }

    fn create_worker(&self, render_mode: RenderMode) -> RenderWorker<E> {
        RenderWorker::new(
            self.egl.clone(),
            self.arbiter.clone(),
            Arc::downgrade(&self.shared),
            render_mode,
        )
    }

    /// Whether the context may be kept while paused. The arbiter may still require it to be
    /// released on drivers with a limited number of contexts. Defaults to false.
    pub fn set_preserve_context_on_pause(&self, preserve: bool) {
        self.shared
            .preserve_context_on_pause
            .store(preserve, Ordering::SeqCst);
    }

    pub fn preserve_context_on_pause(&self) -> bool {
        self.shared.preserve_context_on_pause.load(Ordering::SeqCst)
    }

    pub fn set_debug_flags(&self, flags: DebugFlags) {
        self.shared.debug_flags.set(flags);
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.shared.debug_flags.get()
    }

    #[inline]
    pub fn arbiter(&self) -> &Arc<ContextArbiter> {
        &self.arbiter
    }

    /// The current render thread, if a renderer has been set.
    #[inline]
    pub fn render_worker(&self) -> Option<&RenderWorker<E>> {
        self.worker.as_ref()
    }

    pub fn worker_status(&self) -> Option<WorkerStatus> {
        self.worker.as_ref().map(RenderWorker::status)
    }

    pub fn set_render_mode(&self, render_mode: RenderMode) {
        self.worker().set_render_mode(render_mode)
    }

    pub fn render_mode(&self) -> RenderMode {
        self.worker().render_mode()
    }

    pub fn request_render(&self) {
        self.worker().request_render()
    }

    pub fn on_pause(&self) {
        self.worker().on_pause()
    }

    pub fn on_resume(&self) {
        self.worker().on_resume()
    }

    pub fn queue_event<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.worker().queue_event(task)
    }

    pub fn surface_created(&self) {
        self.worker().surface_created()
    }

    pub fn surface_destroyed(&self) {
        self.worker().surface_destroyed()
    }

    pub fn surface_changed(&self, width: i32, height: i32) {
        self.worker().on_window_resize(width, height)
    }

    /// The host's native window became available at the given size.
    pub fn on_surface_available(&self, native_window: E::NativeWindow, width: i32, height: i32) {
        self.shared.set_native_window(Some(native_window));
        self.surface_created();
        self.surface_changed(width, height);
    }

    pub fn on_surface_size_changed(&self, width: i32, height: i32) {
        self.surface_changed(width, height);
    }

    /// The host's native window is going away. Returns once the render thread has stopped using
    /// it; the return value tells the host it may release the window itself.
    pub fn on_surface_destroyed(&self) -> bool {
        self.surface_destroyed();
        self.shared.set_native_window(None);
        true
    }

    /// The host composited a new frame from the surface.
    pub fn on_surface_updated(&self) {
        if self.render_mode() == RenderMode::Continuously {
            self.request_render();
        }
    }

    pub fn on_layout_change(&self, left: i32, top: i32, right: i32, bottom: i32) {
        self.surface_changed(right.wrapping_sub(left), bottom.wrapping_sub(top));
    }

    /// Restarts the render thread if the view had been detached after a renderer was set. The
    /// new thread keeps the render mode of the previous one.
    pub fn on_attached_to_window(&mut self) -> Result<(), Error> {
        debug!("onAttachedToWindow reattach = {}", self.detached);
        if self.detached && self.shared.has_renderer() {
            let render_mode = self
                .worker
                .as_ref()
                .map_or(RenderMode::Continuously, RenderWorker::render_mode);
            // The previous thread has already exited; dropping it unregisters it.
            self.worker = None;
            let mut worker = self.create_worker(render_mode);
            worker.start()?;
            self.worker = Some(worker);
        }
        self.detached = false;
        Ok(())
    }

    /// Stops the render thread, releasing its native objects.
    ///
    /// Returns the error that terminated the thread, if any.
    pub fn on_detached_from_window(&mut self) -> Result<(), Error> {
        debug!("onDetachedFromWindow");
        let result = match self.worker {
            Some(ref mut worker) => worker.request_exit_and_wait(),
            None => Ok(()),
        };
        self.detached = true;
        result
    }
}

impl<E: Egl> Drop for SurfaceOwner<E> {
    fn drop(&mut self) {
        // The render thread may still be running if the view was never detached. Dropping the
        // worker stops it, or only flags it to exit when this runs on the render thread itself.
        drop(self.worker.take());
    }
}
