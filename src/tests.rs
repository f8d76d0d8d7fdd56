// glthread/src/tests.rs
//
//! Unit tests.

use crate::arbiter::ContextArbiter;
use crate::device::{ConfigAttrib, Egl, OPENGL_ES2_BIT};
use crate::factories::{ComponentSizeChooser, ConfigChooser};
use crate::platform::headless::{HeadlessConfig, HeadlessEgl, HeadlessGl, HeadlessWindow};
use crate::surface_context::SurfaceContext;
use crate::worker::{RenderMode, RenderPhase, WorkerState};
use crate::error::egl_codes;
use crate::{DebugFlags, Error, Renderer, SurfaceOwner, ToWindowingApiError, WindowingApiError};

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

static MSM7K_RENDERER: &str = "Q3Dimension MSM7500 rev 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Event {
    Created(u32),
    Changed(i32, i32),
    Draw,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, predicate: fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|event| predicate(event)).count()
    }

    fn draws(&self) -> usize {
        self.count(|event| *event == Event::Draw)
    }

    fn creations(&self) -> usize {
        self.count(|event| matches!(event, Event::Created(_)))
    }
}

struct RecordingRenderer(Recorder);

impl Renderer<HeadlessEgl> for RecordingRenderer {
    fn on_surface_created(&mut self, _: &HeadlessGl, config: &HeadlessConfig) {
        self.0.push(Event::Created(config.id));
    }

    fn on_surface_changed(&mut self, _: &HeadlessGl, width: i32, height: i32) {
        self.0.push(Event::Changed(width, height));
    }

    // Throttles continuous rendering the way vsync would.
    fn on_draw_frame(&mut self, _: &HeadlessGl) {
        self.0.push(Event::Draw);
        thread::sleep(Duration::from_millis(1));
    }
}

fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn headless(renderer: Option<&str>) -> (Arc<HeadlessEgl>, Arc<ContextArbiter>) {
    let egl = match renderer {
        Some(renderer) => HeadlessEgl::with_renderer(renderer),
        None => HeadlessEgl::new(),
    };
    (Arc::new(egl), Arc::new(ContextArbiter::new()))
}

fn started_owner(
    egl: &Arc<HeadlessEgl>,
    arbiter: &Arc<ContextArbiter>,
    render_mode: RenderMode,
) -> (SurfaceOwner<HeadlessEgl>, Recorder) {
    let recorder = Recorder::default();
    let mut owner = SurfaceOwner::new(egl.clone(), arbiter.clone(), 2);
    owner.set_renderer(RecordingRenderer(recorder.clone())).unwrap();
    owner.set_render_mode(render_mode);
    (owner, recorder)
}

fn show(
    egl: &HeadlessEgl,
    owner: &SurfaceOwner<HeadlessEgl>,
    width: i32,
    height: i32,
) -> HeadlessWindow {
    let window = egl.create_window();
    owner.on_surface_available(window, width, height);
    window
}

// Brings a view rendering on demand to the point where it has drawn its first frame and is
// idle.
fn idle_owner(
    egl: &Arc<HeadlessEgl>,
    arbiter: &Arc<ContextArbiter>,
) -> (SurfaceOwner<HeadlessEgl>, Recorder, HeadlessWindow) {
    let (owner, recorder) = started_owner(egl, arbiter, RenderMode::WhenDirty);
    let window = show(egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() == 1));
    assert!(wait_until(|| owner.worker_status().unwrap().phase() == RenderPhase::Idle));
    (owner, recorder, window)
}

#[test]
fn test_first_frame_after_surface_available() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &owner, 640, 480);

    assert!(wait_until(|| recorder.draws() >= 1));
    let events = recorder.events();
    assert_eq!(
        &events[0..3],
        &[Event::Created(1), Event::Changed(640, 480), Event::Draw]
    );
    assert_eq!(egl.live_context_count(), 1);
    assert_eq!(egl.live_surface_count(), 1);
    // The swap follows the draw callback.
    assert!(wait_until(|| egl.swap_count() >= 1));
}

#[test]
fn test_nothing_is_drawn_without_a_size() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    owner.on_surface_available(egl.create_window(), 0, 480);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.draws(), 0);
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(owner.worker_status().unwrap().phase(), RenderPhase::NoContext);
}

#[test]
fn test_when_dirty_draws_only_on_request() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.draws(), 1);

    owner.request_render();
    assert!(wait_until(|| recorder.draws() == 2));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.draws(), 2);
    assert_eq!(egl.swap_count(), 2);
}

#[test]
fn test_continuous_keeps_drawing() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &owner, 320, 240);

    assert!(wait_until(|| recorder.draws() >= 10));
    assert_eq!(recorder.creations(), 1);
    assert_eq!(owner.render_mode(), RenderMode::Continuously);
}

#[test]
fn test_resize_calls_surface_changed_once() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    owner.on_surface_size_changed(200, 100);
    assert!(wait_until(|| recorder.draws() == 2));
    thread::sleep(Duration::from_millis(50));

    let events = recorder.events();
    assert_eq!(&events[3..], &[Event::Changed(200, 100), Event::Draw]);
    assert_eq!(owner.worker_status().unwrap().size.width, 200);
}

#[test]
fn test_surface_updates_do_not_trigger_on_demand_frames() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    owner.on_surface_updated();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.draws(), 1);
    assert!(!owner.worker_status().unwrap().ready_to_draw);
}

#[test]
fn test_layout_change_resizes_to_the_layout_bounds() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    owner.on_layout_change(10, 20, 110, 220);
    assert!(wait_until(|| recorder.draws() == 2));
    assert!(recorder.events().contains(&Event::Changed(100, 200)));
}

#[test]
fn test_degenerate_layout_bounds_do_not_overflow() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    owner.on_layout_change(i32::MIN, 0, i32::MAX, 100);
    let status = owner.worker_status().unwrap();
    assert_eq!(status.size.width, -1);
    assert!(!status.ready_to_draw);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.draws(), 1);
}

#[test]
fn test_pause_releases_and_resume_recreates() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() >= 1));

    owner.on_pause();
    let status = owner.worker_status().unwrap();
    assert!(status.paused);
    assert!(!status.have_surface);
    assert!(!status.have_context);
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(egl.live_surface_count(), 0);
    assert_eq!(arbiter.owner(), None);

    let draws = recorder.draws();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.draws(), draws);

    owner.on_resume();
    assert!(wait_until(|| recorder.creations() == 2));
    assert!(wait_until(|| recorder.draws() > draws));
    let events = recorder.events();
    let recreated = events
        .iter()
        .rposition(|event| matches!(event, Event::Created(_)))
        .unwrap();
    assert_eq!(events[recreated + 1], Event::Changed(640, 480));
}

#[test]
fn test_pause_is_idempotent() {
    let (egl, arbiter) = headless(None);
    let (owner, _recorder, _window) = idle_owner(&egl, &arbiter);

    owner.on_pause();
    owner.on_pause();
    assert!(owner.worker_status().unwrap().paused);
    owner.on_resume();
    owner.on_resume();
    assert!(!owner.worker_status().unwrap().paused);
}

#[test]
fn test_preserve_context_on_pause() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);
    owner.set_preserve_context_on_pause(true);
    assert!(owner.preserve_context_on_pause());

    owner.on_pause();
    assert_eq!(egl.live_context_count(), 1);
    assert_eq!(egl.live_surface_count(), 0);
    assert_eq!(
        owner.worker_status().unwrap().phase(),
        RenderPhase::ContextOnly
    );

    owner.on_resume();
    assert!(wait_until(|| recorder.draws() == 2));
    assert_eq!(recorder.creations(), 1);
    assert_eq!(egl.context_creation_count(), 1);
    assert_eq!(
        &recorder.events()[3..],
        &[Event::Changed(640, 480), Event::Draw]
    );
}

#[test]
fn test_limited_driver_releases_preserved_context_on_pause() {
    let (egl, arbiter) = headless(Some(MSM7K_RENDERER));
    let (owner, _recorder, _window) = idle_owner(&egl, &arbiter);
    owner.set_preserve_context_on_pause(true);
    assert!(!arbiter.multiple_contexts_allowed());
    assert!(arbiter.should_release_when_pausing());
    assert!(arbiter.should_terminate_when_pausing());

    let terminated = egl.terminate_count();
    owner.on_pause();
    assert_eq!(egl.live_context_count(), 0);
    assert!(egl.terminate_count() > terminated);
    assert_eq!(owner.worker_status().unwrap().phase(), RenderPhase::NoContext);
}

#[test]
fn test_driver_probe_runs_once() {
    let (egl, arbiter) = headless(None);
    assert!(!arbiter.multiple_contexts_allowed());
    let (_owner, _recorder, _window) = idle_owner(&egl, &arbiter);
    assert!(arbiter.multiple_contexts_allowed());
    assert!(!arbiter.should_release_when_pausing());
    assert!(!arbiter.should_terminate_when_pausing());

    // Later probes don't change the verdict.
    arbiter.lock().check_gl_driver_locked(MSM7K_RENDERER);
    assert!(arbiter.multiple_contexts_allowed());
}

#[test]
fn test_arbiter_asks_owner_to_release() {
    let arbiter = ContextArbiter::new();
    let (first, second) = {
        let mut state = arbiter.lock();
        (
            state.register_worker(WorkerState::new(RenderMode::Continuously)),
            state.register_worker(WorkerState::new(RenderMode::Continuously)),
        )
    };

    assert!(arbiter.try_acquire_context(first));
    assert!(arbiter.try_acquire_context(first));
    assert!(!arbiter.try_acquire_context(second));
    assert!(arbiter.lock().worker(first).should_release_context);
    assert_eq!(arbiter.owner(), Some(first));

    arbiter.release_context(second);
    assert_eq!(arbiter.owner(), Some(first));
    arbiter.release_context(first);
    arbiter.release_context(first);
    assert!(arbiter.try_acquire_context(second));
    assert_eq!(arbiter.owner(), Some(second));

    arbiter.on_worker_exiting(second);
    assert_eq!(arbiter.owner(), None);
    assert!(arbiter.lock().worker(second).exited);
}

#[test]
fn test_arbiter_allows_sharing_on_capable_drivers() {
    let arbiter = ContextArbiter::new();
    let (first, second) = {
        let mut state = arbiter.lock();
        state.check_gl_driver_locked("Some Desktop GPU");
        (
            state.register_worker(WorkerState::new(RenderMode::Continuously)),
            state.register_worker(WorkerState::new(RenderMode::Continuously)),
        )
    };

    assert!(arbiter.try_acquire_context(first));
    assert!(arbiter.try_acquire_context(second));
    assert_eq!(arbiter.owner(), Some(first));
    assert!(!arbiter.lock().worker(first).should_release_context);
}

#[test]
fn test_scarce_context_is_shared_between_views() {
    let (egl, arbiter) = headless(Some(MSM7K_RENDERER));
    let (first, first_recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    let (second, second_recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &first, 300, 200);
    show(&egl, &second, 300, 200);

    assert!(wait_until(|| first_recorder.draws() >= 3 && second_recorder.draws() >= 3));
    assert!(arbiter.context_holders() <= 1);
    assert_eq!(egl.peak_context_count(), 1);
    assert!(first_recorder.creations() >= 2 || second_recorder.creations() >= 2);
}

#[test]
fn test_two_views_hold_contexts_on_capable_drivers() {
    let (egl, arbiter) = headless(None);
    let (_first, _first_recorder, _first_window) = idle_owner(&egl, &arbiter);
    let (_second, _second_recorder, _second_window) = idle_owner(&egl, &arbiter);

    assert_eq!(egl.live_context_count(), 2);
    assert_eq!(arbiter.context_holders(), 2);
}

#[test]
fn test_surface_lost_and_reacquired() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    assert!(owner.on_surface_destroyed());
    let status = owner.worker_status().unwrap();
    assert!(status.waiting_for_surface);
    assert!(!status.have_surface);
    assert!(status.have_context);
    assert_eq!(egl.live_surface_count(), 0);
    assert_eq!(egl.live_context_count(), 1);

    show(&egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() == 2));
    assert_eq!(recorder.creations(), 1);
    assert_eq!(egl.live_surface_count(), 1);
}

#[test]
fn test_torn_down_window_marks_surface_bad() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    let window = show(&egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() >= 1));

    egl.tear_down_window(window);
    assert!(wait_until(|| owner.worker_status().unwrap().surface_is_bad));
    let draws = recorder.draws();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.draws(), draws);

    owner.on_surface_destroyed();
    assert!(!owner.worker_status().unwrap().surface_is_bad);
    show(&egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() > draws));
}

#[test]
fn test_context_loss_recreates_context() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() >= 1));

    egl.fail_next_swap(WindowingApiError::ContextLost);
    assert!(wait_until(|| recorder.creations() == 2));
    assert!(wait_until(|| egl.context_creation_count() == 2));
    assert_eq!(egl.live_context_count(), 1);
    let events = recorder.events();
    let recreated = events.iter().rposition(|event| matches!(event, Event::Created(_))).unwrap();
    assert!(wait_until(|| recorder.events().len() > recreated + 1));
    assert_eq!(recorder.events()[recreated + 1], Event::Changed(640, 480));
}

#[test]
fn test_fatal_start_is_reported() {
    let (egl, arbiter) = headless(None);
    egl.set_display_available(false);
    let (mut owner, recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &owner, 640, 480);

    assert!(wait_until(|| owner.worker_status().unwrap().exited));
    assert_eq!(owner.worker_status().unwrap().phase(), RenderPhase::Exited);
    assert_eq!(recorder.draws(), 0);
    assert_eq!(arbiter.owner(), None);
    match owner.on_detached_from_window() {
        Err(Error::ConnectionFailed(WindowingApiError::BadDisplay)) => {}
        result => panic!("unexpected result: {:?}", result),
    }

    // Control calls on an exited thread return immediately.
    owner.on_pause();
    owner.on_resume();
    owner.on_surface_size_changed(1, 1);
}

#[test]
fn test_missing_config_is_fatal() {
    let (egl, arbiter) = headless(None);
    egl.set_configs(vec![]);
    let (mut owner, _recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);
    show(&egl, &owner, 640, 480);

    assert!(wait_until(|| owner.worker_status().unwrap().exited));
    match owner.on_detached_from_window() {
        Err(Error::NoPixelFormatFound) => {}
        result => panic!("unexpected result: {:?}", result),
    }
    assert_eq!(egl.live_context_count(), 0);
}

struct PanickingRenderer;

impl Renderer<HeadlessEgl> for PanickingRenderer {
    fn on_surface_created(&mut self, _: &HeadlessGl, _: &HeadlessConfig) {}

    fn on_surface_changed(&mut self, _: &HeadlessGl, _: i32, _: i32) {}

    fn on_draw_frame(&mut self, _: &HeadlessGl) {
        panic!("renderer failure");
    }
}

#[test]
fn test_renderer_panic_releases_native_objects() {
    let (egl, arbiter) = headless(None);
    let mut owner = SurfaceOwner::new(egl.clone(), arbiter.clone(), 2);
    owner.set_renderer(PanickingRenderer).unwrap();
    show(&egl, &owner, 64, 64);

    assert!(wait_until(|| owner.worker_status().unwrap().exited));
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(egl.live_surface_count(), 0);
    assert_eq!(arbiter.owner(), None);
    match owner.on_detached_from_window() {
        Err(Error::RenderThreadPanicked) => {}
        result => panic!("unexpected result: {:?}", result),
    }
}

#[test]
fn test_detach_and_reattach() {
    let (egl, arbiter) = headless(None);
    let (mut owner, recorder, _window) = idle_owner(&egl, &arbiter);
    let first_id = owner.render_worker().unwrap().id();

    owner.on_detached_from_window().unwrap();
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(egl.live_surface_count(), 0);
    assert!(owner.worker_status().unwrap().exited);

    owner.on_attached_to_window().unwrap();
    assert_ne!(owner.render_worker().unwrap().id(), first_id);
    assert_eq!(owner.render_mode(), RenderMode::WhenDirty);

    owner.on_surface_destroyed();
    show(&egl, &owner, 640, 480);
    assert!(wait_until(|| recorder.draws() == 2));
    assert_eq!(recorder.creations(), 2);
}

#[test]
fn test_attach_without_detach_keeps_the_thread() {
    let (egl, arbiter) = headless(None);
    let (mut owner, _recorder, _window) = idle_owner(&egl, &arbiter);
    let id = owner.render_worker().unwrap().id();

    owner.on_attached_to_window().unwrap();
    assert_eq!(owner.render_worker().unwrap().id(), id);
    assert!(!owner.worker_status().unwrap().exited);
}

#[test]
fn test_dropping_the_owner_releases_everything() {
    let (egl, arbiter) = headless(Some(MSM7K_RENDERER));
    let (owner, _recorder, _window) = idle_owner(&egl, &arbiter);
    assert!(arbiter.owner().is_some());

    drop(owner);
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(egl.live_surface_count(), 0);
    assert_eq!(arbiter.owner(), None);
    assert_eq!(arbiter.context_holders(), 0);
    assert_eq!(arbiter.registered_workers(), 0);
}

#[test]
fn test_owner_dropped_on_its_render_thread() {
    let (egl, arbiter) = headless(Some(MSM7K_RENDERER));
    let (owner, _recorder, _window) = idle_owner(&egl, &arbiter);
    assert_eq!(arbiter.registered_workers(), 1);

    let slot = Arc::new(Mutex::new(Some(owner)));
    let task_slot = slot.clone();
    let (sender, receiver) = mpsc::channel();
    slot.lock().unwrap().as_ref().unwrap().queue_event(move || {
        let owner = task_slot.lock().unwrap().take();
        drop(owner);
        sender.send(()).unwrap();
    });

    receiver.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(slot.lock().unwrap().is_none());
    assert!(wait_until(|| arbiter.registered_workers() == 0));
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(egl.live_surface_count(), 0);
    assert_eq!(arbiter.owner(), None);
}

#[test]
fn test_configuration_after_start_fails() {
    let (egl, arbiter) = headless(None);
    let (mut owner, _recorder) = started_owner(&egl, &arbiter, RenderMode::Continuously);

    match owner.set_config_chooser_depth(false) {
        Err(Error::RenderThreadAlreadyStarted) => {}
        result => panic!("unexpected result: {:?}", result),
    }
    match owner.set_context_client_version(3) {
        Err(Error::RenderThreadAlreadyStarted) => {}
        result => panic!("unexpected result: {:?}", result),
    }
    match owner.set_renderer(RecordingRenderer(Recorder::default())) {
        Err(Error::RenderThreadAlreadyStarted) => {}
        result => panic!("unexpected result: {:?}", result),
    }
    assert_eq!(owner.client_version(), 2);

    // These may change at any time.
    owner.set_preserve_context_on_pause(true);
    owner.set_debug_flags(DebugFlags::LOG_GL_CALLS);
    assert_eq!(owner.debug_flags(), DebugFlags::LOG_GL_CALLS);
}

#[test]
#[should_panic]
fn test_control_before_renderer_panics() {
    let (egl, arbiter) = headless(None);
    let owner = SurfaceOwner::new(egl, arbiter, 2);
    owner.request_render();
}

#[test]
fn test_configured_chooser_is_used() {
    let (egl, arbiter) = headless(None);
    let recorder = Recorder::default();
    let mut owner = SurfaceOwner::new(egl.clone(), arbiter, 2);
    owner.set_config_chooser_sizes(8, 8, 8, 8, 16, 0).unwrap();
    owner.set_renderer(RecordingRenderer(recorder.clone())).unwrap();
    show(&egl, &owner, 64, 64);

    assert!(wait_until(|| recorder.draws() >= 1));
    assert_eq!(recorder.events()[0], Event::Created(4));
}

#[test]
fn test_gles3_falls_back_to_gles2() {
    let (egl, arbiter) = headless(None);
    egl.set_max_client_version(2);
    let recorder = Recorder::default();
    let mut owner = SurfaceOwner::new(egl.clone(), arbiter, 3);
    owner.set_renderer(RecordingRenderer(recorder.clone())).unwrap();
    show(&egl, &owner, 64, 64);

    assert!(wait_until(|| recorder.draws() >= 1));
    assert_eq!(owner.client_version(), 2);
    assert_eq!(egl.live_context_versions(), vec![Some(2)]);
}

#[test]
fn test_component_size_chooser() {
    let egl = HeadlessEgl::new();
    let display = egl.get_display().unwrap();
    egl.initialize(&display).unwrap();

    let chooser = ComponentSizeChooser::new(8, 8, 8, 8, 16, 0);
    let config = chooser.choose_config(&egl, &display, 2).unwrap();
    assert_eq!(config.id, 4);
    assert_eq!(egl.config_attrib(&display, &config, ConfigAttrib::StencilSize), Some(8));

    let config = ComponentSizeChooser::simple(true).choose_config(&egl, &display, 2).unwrap();
    assert_eq!(config.id, 2);
    let config = ComponentSizeChooser::simple(false).choose_config(&egl, &display, 2).unwrap();
    assert_eq!(config.id, 2);

    match ComponentSizeChooser::new(8, 8, 8, 8, 32, 0).choose_config(&egl, &display, 2) {
        Err(Error::NoPixelFormatFound) => {}
        result => panic!("unexpected result: {:?}", result),
    }

    let spec = ComponentSizeChooser::simple(true).config_spec(2);
    assert_eq!(spec.get(ConfigAttrib::RenderableType), Some(OPENGL_ES2_BIT));
    assert_eq!(spec.get(ConfigAttrib::DepthSize), Some(16));
    let spec = ComponentSizeChooser::simple(true).config_spec(3);
    assert_eq!(spec.get(ConfigAttrib::RenderableType), None);
}

#[test]
fn test_egl_error_translation() {
    assert_eq!(
        egl_codes::CONTEXT_LOST.to_windowing_api_error(),
        WindowingApiError::ContextLost
    );
    assert_eq!(
        egl_codes::BAD_NATIVE_WINDOW.to_windowing_api_error(),
        WindowingApiError::BadNativeWindow
    );
    assert_eq!(egl_codes::SUCCESS.to_windowing_api_error(), WindowingApiError::Failed);
    assert_eq!(0x1234_i32.to_windowing_api_error(), WindowingApiError::Failed);
}

#[test]
fn test_surface_context_without_owner() {
    let egl = Arc::new(HeadlessEgl::new());
    let mut surface_context = SurfaceContext::new(egl.clone(), Weak::new());
    assert!(!surface_context.create_surface());
    match surface_context.start() {
        Err(Error::NoOwner) => {}
        result => panic!("unexpected result: {:?}", result),
    }
    assert!(!surface_context.has_context());
    assert!(!surface_context.has_surface());
    assert_eq!(surface_context.swap(), Err(WindowingApiError::BadSurface));

    surface_context.finish();
    surface_context.finish();
    assert!(egl.terminate_count() >= 1);
    assert_eq!(egl.live_context_count(), 0);
}

#[test]
fn test_gl_errors_are_checked_when_asked() {
    let (egl, arbiter) = headless(None);
    let (owner, recorder, _window) = idle_owner(&egl, &arbiter);

    egl.inject_gl_error(0x0502);
    owner.request_render();
    assert!(wait_until(|| recorder.draws() == 2));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(egl.gl_error(), 0x0502);

    owner.set_debug_flags(DebugFlags::CHECK_GL_ERROR);
    owner.request_render();
    assert!(wait_until(|| egl.gl_error() == 0));
}

#[test]
fn test_tasks_run_in_order() {
    let (egl, arbiter) = headless(None);
    let (owner, _recorder, _window) = idle_owner(&egl, &arbiter);

    let order = Arc::new(Mutex::new(vec![]));
    for index in 0..10 {
        let order = order.clone();
        owner.queue_event(move || order.lock().unwrap().push(index));
    }
    assert!(wait_until(|| order.lock().unwrap().len() == 10));
    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_tasks_run_while_paused() {
    let (egl, arbiter) = headless(None);
    let (owner, _recorder, _window) = idle_owner(&egl, &arbiter);
    owner.on_pause();

    let (sender, receiver) = mpsc::channel();
    owner.queue_event(move || sender.send(thread::current().name().map(str::to_owned)).unwrap());
    let name = receiver.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(name.unwrap().starts_with("GLThread"));
}

#[test]
fn test_exit_discards_pending_tasks() {
    let (egl, arbiter) = headless(None);
    let (mut owner, _recorder) = started_owner(&egl, &arbiter, RenderMode::WhenDirty);

    let (started_sender, started_receiver) = mpsc::channel();
    let (release_sender, release_receiver) = mpsc::channel::<()>();
    owner.queue_event(move || {
        started_sender.send(()).unwrap();
        let _ = release_receiver.recv();
    });
    started_receiver.recv_timeout(Duration::from_secs(10)).unwrap();

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let ran = ran.clone();
        owner.queue_event(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(owner.worker_status().unwrap().pending_tasks, 4);

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        release_sender.send(()).unwrap();
    });
    owner.on_detached_from_window().unwrap();
    releaser.join().unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

struct View {
    owner: SurfaceOwner<HeadlessEgl>,
    window: Option<HeadlessWindow>,
}

#[test]
fn test_random_lifecycle_keeps_invariants() {
    let (egl, arbiter) = headless(Some(MSM7K_RENDERER));
    let mut views: Vec<View> = (0..2)
        .map(|_| View {
            owner: started_owner(&egl, &arbiter, RenderMode::Continuously).0,
            window: None,
        })
        .collect();

    let mut rng = rand::thread_rng();
    for _ in 0..300 {
        let index = rng.gen_range(0..views.len());
        let view = &mut views[index];
        match rng.gen_range(0..8) {
            0 => view.owner.on_pause(),
            1 => view.owner.on_resume(),
            2 => {
                if view.window.take().is_some() {
                    view.owner.on_surface_destroyed();
                }
            }
            3 => {
                if view.window.is_none() {
                    let width = rng.gen_range(1..512);
                    let height = rng.gen_range(1..512);
                    view.window = Some(show(&egl, &view.owner, width, height));
                }
            }
            4 => view
                .owner
                .on_surface_size_changed(rng.gen_range(0..512), rng.gen_range(0..512)),
            5 => view.owner.request_render(),
            6 => {
                let render_mode = if rng.gen() {
                    RenderMode::Continuously
                } else {
                    RenderMode::WhenDirty
                };
                view.owner.set_render_mode(render_mode);
            }
            _ => view.owner.queue_event(|| {}),
        }

        for view in &views {
            let status = view.owner.worker_status().unwrap();
            assert!(!status.have_surface || status.have_context);
            assert!(!status.exited);
        }
        assert!(arbiter.context_holders() <= 1);
    }

    drop(views);
    assert!(egl.peak_context_count() <= 1);
    assert_eq!(egl.live_context_count(), 0);
    assert_eq!(egl.live_surface_count(), 0);
}
