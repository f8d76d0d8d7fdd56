// glthread/src/worker.rs
//
//! The render thread.
//!
//! A render thread owns a `SurfaceContext`, creates and destroys its native objects in response
//! to lifecycle requests from the UI thread, and drives the renderer. All potentially blocking
//! synchronization goes through the `ContextArbiter` monitor.

use crate::arbiter::{ArbiterState, ContextArbiter, WorkerId};
use crate::context::DebugFlags;
use crate::device::Egl;
use crate::gl_info::GlInfo;
use crate::owner::OwnerShared;
use crate::renderer::Renderer;
use crate::surface_context::SurfaceContext;
use crate::{Error, WindowingApiError};

use euclid::default::Size2D;
use log::{debug, error, warn};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, MutexGuard, Weak};
use std::thread::{self, JoinHandle};

/// When the renderer is asked to draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Only when a render is requested or the surface is resized.
    WhenDirty,
    /// Repeatedly, as fast as the surface allows.
    Continuously,
}

pub(crate) type Task = Box<dyn FnOnce() + Send>;

// Once the thread is started, this is only accessed under the arbiter monitor.
pub(crate) struct WorkerState {
    pub(crate) running: bool,
    pub(crate) should_exit: bool,
    pub(crate) exited: bool,
    pub(crate) requested_paused: bool,
    pub(crate) paused: bool,
    pub(crate) has_surface: bool,
    pub(crate) surface_is_bad: bool,
    pub(crate) waiting_for_surface: bool,
    pub(crate) have_context: bool,
    pub(crate) have_surface: bool,
    pub(crate) should_release_context: bool,
    pub(crate) size: Size2D<i32>,
    pub(crate) size_changed: bool,
    pub(crate) render_mode: RenderMode,
    pub(crate) request_render: bool,
    pub(crate) render_complete: bool,
    pub(crate) tasks: VecDeque<Task>,
    pub(crate) handle_dropped: bool,
}

impl WorkerState {
    pub(crate) fn new(render_mode: RenderMode) -> WorkerState {
        WorkerState {
            running: false,
            should_exit: false,
            exited: false,
            requested_paused: false,
            paused: false,
            has_surface: false,
            surface_is_bad: false,
            waiting_for_surface: false,
            have_context: false,
            have_surface: false,
            should_release_context: false,
            size: Size2D::new(0, 0),
            size_changed: true,
            render_mode,
            request_render: true,
            render_complete: false,
            tasks: VecDeque::new(),
            handle_dropped: false,
        }
    }

    // A pending resize counts as a render request, so that a resized surface is redrawn even
    // when rendering only on demand.
    pub(crate) fn ready_to_draw(&self) -> bool {
        !self.paused
            && self.has_surface
            && !self.surface_is_bad
            && self.size.width > 0
            && self.size.height > 0
            && (self.request_render
                || self.size_changed
                || self.render_mode == RenderMode::Continuously)
    }

    pub(crate) fn able_to_draw(&self) -> bool {
        self.have_context && self.have_surface && self.ready_to_draw()
    }

    fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.running,
            exited: self.exited,
            paused: self.paused,
            has_native_surface: self.has_surface,
            waiting_for_surface: self.waiting_for_surface,
            surface_is_bad: self.surface_is_bad,
            have_context: self.have_context,
            have_surface: self.have_surface,
            ready_to_draw: self.ready_to_draw(),
            size: self.size,
            render_mode: self.render_mode,
            render_complete: self.render_complete,
            pending_tasks: self.tasks.len(),
        }
    }
}

/// Where a render thread is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    /// The thread has not entered its loop yet.
    Created,
    /// Running without a context.
    NoContext,
    /// Running with a context but no surface.
    ContextOnly,
    /// Has a surface but nothing to draw.
    Idle,
    /// Has a surface and is drawing.
    Drawing,
    /// The thread has finished.
    Exited,
}

/// A snapshot of a render thread's state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkerStatus {
    pub running: bool,
    pub exited: bool,
    pub paused: bool,
    pub has_native_surface: bool,
    pub waiting_for_surface: bool,
    pub surface_is_bad: bool,
    pub have_context: bool,
    pub have_surface: bool,
    pub ready_to_draw: bool,
    pub size: Size2D<i32>,
    pub render_mode: RenderMode,
    pub render_complete: bool,
    pub pending_tasks: usize,
}

impl WorkerStatus {
    pub fn phase(&self) -> RenderPhase {
        if self.exited {
            RenderPhase::Exited
        } else if !self.running {
            RenderPhase::Created
        } else if !self.have_context {
            RenderPhase::NoContext
        } else if !self.have_surface {
            RenderPhase::ContextOnly
        } else if self.ready_to_draw {
            RenderPhase::Drawing
        } else {
            RenderPhase::Idle
        }
    }
}

/// The UI-thread handle to a render thread.
///
/// Dropping a started worker asks its thread to exit and waits for it.
pub struct RenderWorker<E: Egl> {
    id: WorkerId,
    egl: Arc<E>,
    arbiter: Arc<ContextArbiter>,
    owner: Weak<OwnerShared<E>>,
    thread: Option<JoinHandle<Result<(), Error>>>,
}

impl<E: Egl> RenderWorker<E> {
    pub(crate) fn new(
        egl: Arc<E>,
        arbiter: Arc<ContextArbiter>,
        owner: Weak<OwnerShared<E>>,
        render_mode: RenderMode,
    ) -> RenderWorker<E> {
        let id = arbiter.lock().register_worker(WorkerState::new(render_mode));
        RenderWorker {
            id,
            egl,
            arbiter,
            owner,
            thread: None,
        }
    }

    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Spawns the render thread. May only be called once.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.thread.is_some() {
            return Err(Error::RenderThreadAlreadyStarted);
        }

        let mut render_loop = RenderLoop {
            id: self.id,
            arbiter: self.arbiter.clone(),
            owner: self.owner.clone(),
            surface_context: SurfaceContext::new(self.egl.clone(), self.owner.clone()),
        };
        let handle = thread::Builder::new()
            .name(format!("GLThread {}", self.id))
            .spawn(move || {
                debug!("starting tid={:?}", thread::current().id());
                let result = render_loop.guarded_run();
                if let Err(ref err) = result {
                    error!("render thread {} failed: {:?}", render_loop.id, err);
                }
                result
            })
            .map_err(|_| Error::ThreadSpawnFailed)?;
        self.thread = Some(handle);
        Ok(())
    }

    pub fn set_render_mode(&self, render_mode: RenderMode) {
        self.lock().worker_mut(self.id).render_mode = render_mode;
        self.arbiter.notify_all();
    }

    pub fn render_mode(&self) -> RenderMode {
        self.lock().worker(self.id).render_mode
    }

    /// Asks for a frame to be drawn. Only needed in `RenderMode::WhenDirty`.
    pub fn request_render(&self) {
        self.lock().worker_mut(self.id).request_render = true;
        self.arbiter.notify_all();
    }

    /// The native surface now exists. Blocks until the render thread has noticed.
    pub fn surface_created(&self) {
        let mut guard = self.lock();
        debug!("surfaceCreated tid={}", self.id);
        guard.worker_mut(self.id).has_surface = true;
        self.arbiter.notify_all();
        self.wait_while(guard, |state| state.waiting_for_surface && !state.exited);
    }

    /// The native surface is about to go away. Blocks until the render thread has stopped using
    /// it.
    pub fn surface_destroyed(&self) {
        let mut guard = self.lock();
        debug!("surfaceDestroyed tid={}", self.id);
        guard.worker_mut(self.id).has_surface = false;
        self.arbiter.notify_all();
        self.wait_while(guard, |state| !state.waiting_for_surface && !state.exited);
    }

    /// Blocks until the render thread has paused.
    pub fn on_pause(&self) {
        let mut guard = self.lock();
        debug!("onPause tid={}", self.id);
        guard.worker_mut(self.id).requested_paused = true;
        self.arbiter.notify_all();
        self.wait_while(guard, |state| !state.exited && !state.paused);
    }

    /// Blocks until the render thread has resumed.
    pub fn on_resume(&self) {
        let mut guard = self.lock();
        debug!("onResume tid={}", self.id);
        {
            let state = guard.worker_mut(self.id);
            state.requested_paused = false;
            state.request_render = true;
            state.render_complete = false;
        }
        self.arbiter.notify_all();
        self.wait_while(guard, |state| {
            !state.exited && state.paused && !state.render_complete
        });
    }

    /// Blocks until the render thread has drawn a frame at the new size, unless it currently
    /// can't draw at all.
    pub fn on_window_resize(&self, width: i32, height: i32) {
        let mut guard = self.lock();
        {
            let state = guard.worker_mut(self.id);
            state.size = Size2D::new(width, height);
            state.size_changed = true;
            state.request_render = state.render_mode == RenderMode::Continuously;
            state.render_complete = false;
        }
        self.arbiter.notify_all();
        self.wait_while(guard, |state| {
            !state.exited && !state.paused && !state.render_complete && state.able_to_draw()
        });
    }

    /// Asks the thread owning the context (this one) to release it.
    pub fn request_release_context(&self) {
        self.lock().worker_mut(self.id).should_release_context = true;
        self.arbiter.notify_all();
    }

    /// Queues a task to run on the render thread, between frames.
    pub fn queue_event<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().worker_mut(self.id).tasks.push_back(Box::new(task));
        self.arbiter.notify_all();
    }

    /// Asks the render thread to exit, waits for it to release its native objects and joins it.
    ///
    /// Returns the error that terminated the thread, if any.
    ///
    /// # Panics
    ///
    /// Panics if called from the render thread itself, which would otherwise deadlock.
    pub fn request_exit_and_wait(&mut self) -> Result<(), Error> {
        if let Some(ref handle) = self.thread {
            assert_ne!(
                handle.thread().id(),
                thread::current().id(),
                "request_exit_and_wait() must not be called from the render thread"
            );
        }
        let handle = match self.thread.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        {
            let mut guard = self.lock();
            guard.worker_mut(self.id).should_exit = true;
            self.arbiter.notify_all();
            while !guard.worker(self.id).exited {
                guard = self.arbiter.wait(guard);
            }
        }

        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(Error::RenderThreadPanicked),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        self.lock().worker(self.id).status()
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.arbiter.lock()
    }

    // Without a thread there is nothing to wait for.
    fn wait_while<F>(&self, mut guard: MutexGuard<'_, ArbiterState>, mut condition: F)
    where
        F: FnMut(&WorkerState) -> bool,
    {
        if self.thread.is_none() {
            return;
        }
        while condition(guard.worker(self.id)) {
            guard = self.arbiter.wait(guard);
        }
    }
}

impl<E: Egl> Drop for RenderWorker<E> {
    fn drop(&mut self) {
        let on_render_thread = self
            .thread
            .as_ref()
            .map_or(false, |handle| handle.thread().id() == thread::current().id());
        if on_render_thread {
            // The loop notices on its next cycle and unregisters its own state on the way out.
            {
                let mut guard = self.lock();
                let state = guard.worker_mut(self.id);
                state.should_exit = true;
                state.handle_dropped = true;
            }
            self.arbiter.notify_all();
            return;
        }

        if let Err(err) = self.request_exit_and_wait() {
            error!("render thread {} exited with {:?}", self.id, err);
        }
        self.lock().unregister_worker(self.id);
        self.arbiter.notify_all();
    }
}

// The state private to the render thread itself.
struct RenderLoop<E: Egl> {
    id: WorkerId,
    arbiter: Arc<ContextArbiter>,
    owner: Weak<OwnerShared<E>>,
    surface_context: SurfaceContext<E>,
}

impl<E: Egl> RenderLoop<E> {
    // Must be called under the monitor.
    fn stop_surface_locked(&mut self, state: &mut ArbiterState) {
        let worker = state.worker_mut(self.id);
        if worker.have_surface {
            worker.have_surface = false;
            self.surface_context.destroy_surface();
        }
    }

    // Must be called under the monitor.
    fn stop_context_locked(&mut self, state: &mut ArbiterState) {
        self.stop_surface_locked(state);
        let worker = state.worker_mut(self.id);
        if worker.have_context {
            self.surface_context.finish();
            worker.have_context = false;
            state.release_context_locked(self.id);
            self.arbiter.notify_all();
        }
    }

    fn preserve_context_on_pause(&self) -> bool {
        self.owner.upgrade().map_or(false, |owner| {
            owner.preserve_context_on_pause.load(Ordering::SeqCst)
        })
    }

    fn with_renderer<F>(&self, callback: F)
    where
        F: FnOnce(&mut dyn Renderer<E>, DebugFlags),
    {
        let owner = match self.owner.upgrade() {
            Some(owner) => owner,
            None => return,
        };
        let debug_flags = owner.debug_flags.get();
        let mut renderer = owner.renderer.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(ref mut renderer) = *renderer {
            callback(&mut **renderer, debug_flags);
        }
    }

    fn guarded_run(&mut self) -> Result<(), Error> {
        let id = self.id;
        let mut gl: Option<E::Gl> = None;
        let mut create_context = false;
        let mut create_surface = false;
        let mut create_gl_interface = false;
        let mut lost_context = false;
        let mut size_changed = false;
        let mut want_render_notification = false;
        let mut do_render_notification = false;
        let mut asked_to_release_context = false;
        let mut size = Size2D::new(0, 0);

        self.arbiter.lock().worker_mut(id).running = true;
        self.arbiter.notify_all();

        loop {
            let mut task = None;
            {
                let arbiter = self.arbiter.clone();
                let mut guard = arbiter.lock();
                loop {
                    if guard.worker(id).should_exit {
                        return Ok(());
                    }

                    if let Some(next) = guard.worker_mut(id).tasks.pop_front() {
                        task = Some(next);
                        break;
                    }

                    // Update the pause state.
                    let mut pausing = false;
                    {
                        let state = guard.worker_mut(id);
                        if state.paused != state.requested_paused {
                            pausing = state.requested_paused;
                            state.paused = state.requested_paused;
                            self.arbiter.notify_all();
                            debug!(
                                "{} tid={}",
                                if state.paused { "paused" } else { "resumed" },
                                id
                            );
                        }
                    }

                    // Do we need to give up the context?
                    if guard.worker(id).should_release_context {
                        debug!("releasing context because asked to tid={}", id);
                        self.stop_context_locked(&mut guard);
                        guard.worker_mut(id).should_release_context = false;
                        asked_to_release_context = true;
                    }

                    if lost_context {
                        self.stop_context_locked(&mut guard);
                        lost_context = false;
                    }

                    // When pausing, release the surface.
                    if pausing && guard.worker(id).have_surface {
                        debug!("releasing surface because paused tid={}", id);
                        self.stop_surface_locked(&mut guard);
                    }

                    // When pausing, optionally release the context.
                    if pausing && guard.worker(id).have_context {
                        if !self.preserve_context_on_pause() || guard.should_release_when_pausing()
                        {
                            self.stop_context_locked(&mut guard);
                            debug!("releasing context because paused tid={}", id);
                        }
                    }

                    // When pausing, optionally terminate the display.
                    if pausing && guard.should_terminate_when_pausing() {
                        self.stop_context_locked(&mut guard);
                        self.surface_context.finish();
                        debug!("terminating display because paused tid={}", id);
                    }

                    // Have we lost the native surface?
                    let (has_surface, waiting_for_surface) = {
                        let state = guard.worker(id);
                        (state.has_surface, state.waiting_for_surface)
                    };
                    if !has_surface && !waiting_for_surface {
                        debug!("noticed surface lost tid={}", id);
                        self.stop_surface_locked(&mut guard);
                        let state = guard.worker_mut(id);
                        state.waiting_for_surface = true;
                        state.surface_is_bad = false;
                        self.arbiter.notify_all();
                    }

                    // Have we acquired the native surface?
                    if has_surface && waiting_for_surface {
                        debug!("noticed surface acquired tid={}", id);
                        guard.worker_mut(id).waiting_for_surface = false;
                        self.arbiter.notify_all();
                    }

                    if do_render_notification {
                        debug!("sending render notification tid={}", id);
                        want_render_notification = false;
                        do_render_notification = false;
                        guard.worker_mut(id).render_complete = true;
                        self.arbiter.notify_all();
                    }

                    if guard.worker(id).ready_to_draw() {
                        // If we don't have a context, try to acquire one.
                        if !guard.worker(id).have_context {
                            if asked_to_release_context {
                                asked_to_release_context = false;
                            } else if guard.try_acquire_context_locked(id) {
                                self.arbiter.notify_all();
                                if let Err(err) = self.surface_context.start() {
                                    guard.release_context_locked(id);
                                    self.arbiter.notify_all();
                                    return Err(err);
                                }
                                guard.worker_mut(id).have_context = true;
                                create_context = true;
                                self.arbiter.notify_all();
                            }
                        }

                        let state = guard.worker_mut(id);
                        if state.have_context && !state.have_surface {
                            state.have_surface = true;
                            create_surface = true;
                            create_gl_interface = true;
                            size_changed = true;
                        }

                        if state.have_surface {
                            if state.size_changed {
                                size_changed = true;
                                size = state.size;
                                want_render_notification = true;
                                debug!(
                                    "noticing that we want render notification tid={}",
                                    id
                                );
                                // Destroy and recreate the surface.
                                create_surface = true;
                                state.size_changed = false;
                            }
                            state.request_render = false;
                            self.arbiter.notify_all();
                            break;
                        }
                    }

                    // This is the only place the render thread waits.
                    guard = arbiter.wait(guard);
                }
            }

            if let Some(task) = task.take() {
                task();
                continue;
            }

            if create_surface {
                debug!("egl createSurface tid={}", id);
                if !self.surface_context.create_surface() {
                    self.arbiter.lock().worker_mut(id).surface_is_bad = true;
                    self.arbiter.notify_all();
                    continue;
                }
                create_surface = false;
            }

            if create_gl_interface {
                gl = self.surface_context.create_gl();
                if let Some(ref gl) = gl {
                    self.arbiter.probe_driver_once(gl);
                }
                create_gl_interface = false;
            }

            if let Some(ref gl) = gl {
                if create_context {
                    if let Some(config) = self.surface_context.config().cloned() {
                        self.with_renderer(|renderer, debug_flags| {
                            if debug_flags.contains(DebugFlags::LOG_GL_CALLS) {
                                debug!("onSurfaceCreated tid={}", id);
                            }
                            renderer.on_surface_created(gl, &config);
                        });
                    }
                    create_context = false;
                }

                if size_changed {
                    self.with_renderer(|renderer, debug_flags| {
                        if debug_flags.contains(DebugFlags::LOG_GL_CALLS) {
                            debug!("onSurfaceChanged({}, {}) tid={}", size.width, size.height, id);
                        }
                        renderer.on_surface_changed(gl, size.width, size.height);
                    });
                    size_changed = false;
                }

                self.with_renderer(|renderer, debug_flags| {
                    if debug_flags.contains(DebugFlags::LOG_GL_CALLS) {
                        debug!("onDrawFrame tid={}", id);
                    }
                    renderer.on_draw_frame(gl);
                    if debug_flags.contains(DebugFlags::CHECK_GL_ERROR) {
                        let gl_error = gl.error();
                        if gl_error != 0 {
                            error!("GL error 0x{:x} after onDrawFrame tid={}", gl_error, id);
                        }
                    }
                });
            }

            match self.surface_context.swap() {
                Ok(()) => {}
                Err(WindowingApiError::ContextLost) => {
                    debug!("egl context lost tid={}", id);
                    lost_context = true;
                }
                Err(err) => {
                    // Other errors typically mean that the native surface is gone but we
                    // haven't been notified yet.
                    warn!("eglSwapBuffers failed: {:?}", err);
                    self.arbiter.lock().worker_mut(id).surface_is_bad = true;
                    self.arbiter.notify_all();
                }
            }

            if want_render_notification {
                do_render_notification = true;
            }
        }
    }
}

impl<E: Egl> Drop for RenderLoop<E> {
    // Runs when the loop returns, fails or unwinds.
    fn drop(&mut self) {
        let arbiter = self.arbiter.clone();
        let mut guard = arbiter.lock();
        self.stop_context_locked(&mut guard);
        self.surface_context.finish();
        guard.thread_exiting_locked(self.id);
        // The handle was dropped on this thread, so nobody else will unregister the state.
        if guard.worker(self.id).handle_dropped {
            guard.unregister_worker(self.id);
        }
        arbiter.notify_all();
    }
}
