// glthread/src/arbiter.rs
//
//! Arbitration of the native context slot between render threads.
//!
//! Some older GPUs can only support one context per process. The arbiter tracks which render
//! thread currently owns "the" context and asks it to give the context up when another thread
//! needs one.
//!
//! The arbiter's monitor is also the single monitor guarding every render thread's state, so
//! that no code ever has to order two locks. Every change is followed by a broadcast to every
//! waiter.

use crate::gl_info::GlInfo;
use crate::worker::WorkerState;

use fnv::FnvHashMap;
use log::debug;
use std::fmt::{self, Display, Formatter};
use std::sync::{Condvar, Mutex, MutexGuard};

/// Renderer strings starting with this prefix belong to a driver that cannot support multiple
/// contexts.
const MSM7K_RENDERER_PREFIX: &str = "Q3Dimension MSM7500 ";

/// Identifies a render thread registered with an arbiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerId(pub u64);

impl Display for WorkerId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared between all the render threads of an application.
pub struct ContextArbiter {
    state: Mutex<ArbiterState>,
    cond: Condvar,
}

pub(crate) struct ArbiterState {
    owner: Option<WorkerId>,
    driver_check_done: bool,
    multiple_contexts_allowed: bool,
    limited_contexts: bool,
    next_worker_id: u64,
    workers: FnvHashMap<WorkerId, WorkerState>,
}

impl Default for ContextArbiter {
    fn default() -> ContextArbiter {
        ContextArbiter::new()
    }
}

impl ContextArbiter {
    pub fn new() -> ContextArbiter {
        ContextArbiter {
            state: Mutex::new(ArbiterState {
                owner: None,
                driver_check_done: false,
                multiple_contexts_allowed: false,
                limited_contexts: false,
                next_worker_id: 0,
                workers: FnvHashMap::default(),
            }),
            cond: Condvar::new(),
        }
    }

    // Enter the monitor.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    // The one way of blocking on the monitor.
    pub(crate) fn wait<'a>(
        &self,
        guard: MutexGuard<'a, ArbiterState>,
    ) -> MutexGuard<'a, ArbiterState> {
        self.cond.wait(guard).unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn notify_all(&self) {
        self.cond.notify_all()
    }

    /// Tries once, without blocking, to acquire the right to use a context.
    ///
    /// If another thread owns the context on hardware that only supports one, that thread is
    /// asked to release it and this returns false; the caller should retry later. There is no
    /// fairness policy: a thread drawing continuously may simply reacquire the context.
    pub fn try_acquire_context(&self, worker: WorkerId) -> bool {
        let mut guard = self.lock();
        let acquired = guard.try_acquire_context_locked(worker);
        self.notify_all();
        acquired
    }

    /// Gives up the context if `worker` owns it.
    pub fn release_context(&self, worker: WorkerId) {
        self.lock().release_context_locked(worker);
        self.notify_all();
    }

    /// Whether contexts should be released when pausing, even though multiple contexts are
    /// supported, because the device could run out of them.
    pub fn should_release_when_pausing(&self) -> bool {
        self.lock().should_release_when_pausing()
    }

    /// Whether the display should be terminated when pausing.
    pub fn should_terminate_when_pausing(&self) -> bool {
        self.lock().should_terminate_when_pausing()
    }

    /// Inspects the driver behind `gl`, the first time this is called.
    pub fn probe_driver_once<G: GlInfo + ?Sized>(&self, gl: &G) {
        let mut guard = self.lock();
        if guard.driver_check_done {
            return;
        }
        let renderer = gl.renderer();
        guard.check_gl_driver_locked(&renderer);
        self.notify_all();
    }

    /// Marks `worker` as exited and gives up its context.
    pub fn on_worker_exiting(&self, worker: WorkerId) {
        self.lock().thread_exiting_locked(worker);
        self.notify_all();
    }

    /// The thread currently owning the context, if any.
    pub fn owner(&self) -> Option<WorkerId> {
        self.lock().owner
    }

    /// How many registered threads currently hold a context.
    pub fn context_holders(&self) -> usize {
        self.lock()
            .workers
            .values()
            .filter(|state| state.have_context)
            .count()
    }

    /// How many render threads are registered, including ones that have exited but whose
    /// handles are still alive.
    pub fn registered_workers(&self) -> usize {
        self.lock().workers.len()
    }

    /// Whether the driver probe has concluded that multiple contexts are safe.
    pub fn multiple_contexts_allowed(&self) -> bool {
        self.lock().multiple_contexts_allowed
    }
}

impl ArbiterState {
    pub(crate) fn register_worker(&mut self, state: WorkerState) -> WorkerId {
        let id = WorkerId(self.next_worker_id);
        self.next_worker_id += 1;
        self.workers.insert(id, state);
        id
    }

    pub(crate) fn unregister_worker(&mut self, worker: WorkerId) {
        if self.owner == Some(worker) {
            self.owner = None;
        }
        self.workers.remove(&worker);
    }

    pub(crate) fn worker(&self, worker: WorkerId) -> &WorkerState {
        self.workers
            .get(&worker)
            .expect("render worker state is registered until the worker is dropped")
    }

    pub(crate) fn worker_mut(&mut self, worker: WorkerId) -> &mut WorkerState {
        self.workers
            .get_mut(&worker)
            .expect("render worker state is registered until the worker is dropped")
    }

    pub(crate) fn try_acquire_context_locked(&mut self, worker: WorkerId) -> bool {
        match self.owner {
            None => {
                self.owner = Some(worker);
                return true;
            }
            Some(owner) if owner == worker => return true,
            Some(_) => {}
        }
        if self.multiple_contexts_allowed {
            return true;
        }
        // TODO: implement a fairness policy. If the owning thread is drawing continuously it
        // will just reacquire the context.
        if let Some(owner) = self.owner {
            if let Some(state) = self.workers.get_mut(&owner) {
                debug!("worker {} asking worker {} to release the context", worker, owner);
                state.should_release_context = true;
            }
        }
        false
    }

    pub(crate) fn release_context_locked(&mut self, worker: WorkerId) {
        if self.owner == Some(worker) {
            self.owner = None;
        }
    }

    #[inline]
    pub(crate) fn should_release_when_pausing(&self) -> bool {
        self.limited_contexts
    }

    #[inline]
    pub(crate) fn should_terminate_when_pausing(&self) -> bool {
        !self.multiple_contexts_allowed
    }

    pub(crate) fn check_gl_driver_locked(&mut self, renderer: &str) {
        if self.driver_check_done {
            return;
        }
        self.multiple_contexts_allowed = !renderer.starts_with(MSM7K_RENDERER_PREFIX);
        self.limited_contexts = !self.multiple_contexts_allowed;
        debug!(
            "checkGLDriver renderer = \"{}\" multipleContextsAllowed = {} limitedContexts = {}",
            renderer, self.multiple_contexts_allowed, self.limited_contexts
        );
        self.driver_check_done = true;
    }

    pub(crate) fn thread_exiting_locked(&mut self, worker: WorkerId) {
        debug!("exiting worker {}", worker);
        if let Some(state) = self.workers.get_mut(&worker) {
            state.exited = true;
        }
        if self.owner == Some(worker) {
            self.owner = None;
        }
    }
}
