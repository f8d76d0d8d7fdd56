// glthread/demos/lifecycle.rs
//
//! This example drives two views that share one context arbiter through a typical activity
//! lifecycle on the headless backend.
//!
//! Pass `--renderer "Q3Dimension MSM7500 "` to make the driver report that it only supports one
//! context, and watch the two render threads hand it back and forth.

use clap::{App, Arg};
use glthread::platform::headless::{HeadlessConfig, HeadlessGl};
use glthread::{ContextArbiter, DebugFlags, HeadlessEgl, RenderMode, Renderer, SurfaceOwner};
use log::{info, LevelFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

static APP_NAME: &'static str = "glthread lifecycle example";

const VIEW_WIDTH: i32 = 640;
const VIEW_HEIGHT: i32 = 480;

struct CountingRenderer {
    name: &'static str,
    frames: Arc<AtomicUsize>,
}

impl Renderer<HeadlessEgl> for CountingRenderer {
    fn on_surface_created(&mut self, gl: &HeadlessGl, config: &HeadlessConfig) {
        info!(
            "{}: surface created (context {}, config {:?})",
            self.name,
            gl.context_id(),
            config
        );
    }

    fn on_surface_changed(&mut self, _: &HeadlessGl, width: i32, height: i32) {
        info!("{}: surface changed to {}x{}", self.name, width, height);
    }

    fn on_draw_frame(&mut self, _: &HeadlessGl) {
        self.frames.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(16));
    }
}

struct View {
    owner: SurfaceOwner<HeadlessEgl>,
    frames: Arc<AtomicUsize>,
}

impl View {
    fn new(
        name: &'static str,
        egl: &Arc<HeadlessEgl>,
        arbiter: &Arc<ContextArbiter>,
        render_mode: RenderMode,
    ) -> View {
        let frames = Arc::new(AtomicUsize::new(0));
        let mut owner = SurfaceOwner::new(egl.clone(), arbiter.clone(), 2);
        owner.set_debug_flags(DebugFlags::CHECK_GL_ERROR);
        owner
            .set_renderer(CountingRenderer {
                name,
                frames: frames.clone(),
            })
            .unwrap();
        owner.set_render_mode(render_mode);
        View { owner, frames }
    }

    // Waits for `count` more frames, requesting each one when rendering on demand.
    fn draw_frames(&self, count: usize) {
        let target = self.frames.load(Ordering::SeqCst) + count;
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.frames.load(Ordering::SeqCst) < target && Instant::now() < deadline {
            if self.owner.render_mode() == RenderMode::WhenDirty {
                self.owner.request_render();
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let matches = App::new(APP_NAME)
        .arg(
            Arg::with_name("renderer")
                .short("r")
                .long("renderer")
                .takes_value(true)
                .help("The GL_RENDERER string the headless driver reports"),
        )
        .arg(
            Arg::with_name("when-dirty")
                .short("d")
                .long("when-dirty")
                .help("Only render when a frame is requested"),
        )
        .arg(
            Arg::with_name("frames")
                .short("f")
                .long("frames")
                .takes_value(true)
                .default_value("10")
                .help("Frames to draw in each phase"),
        )
        .get_matches();

    let egl = Arc::new(match matches.value_of("renderer") {
        Some(renderer) => HeadlessEgl::with_renderer(renderer),
        None => HeadlessEgl::new(),
    });
    let render_mode = if matches.is_present("when-dirty") {
        RenderMode::WhenDirty
    } else {
        RenderMode::Continuously
    };
    let frames: usize = matches
        .value_of("frames")
        .unwrap()
        .parse()
        .expect("--frames must be a number");

    let arbiter = Arc::new(ContextArbiter::new());
    let mut views = vec![
        View::new("left", &egl, &arbiter, render_mode),
        View::new("right", &egl, &arbiter, render_mode),
    ];

    info!("attaching surfaces");
    for view in &views {
        view.owner
            .on_surface_available(egl.create_window(), VIEW_WIDTH, VIEW_HEIGHT);
    }
    for view in &views {
        view.draw_frames(frames);
    }
    info!(
        "multiple contexts allowed: {}, live contexts: {}",
        arbiter.multiple_contexts_allowed(),
        egl.live_context_count()
    );

    info!("rotating");
    for view in &views {
        view.owner.on_surface_size_changed(VIEW_HEIGHT, VIEW_WIDTH);
        view.draw_frames(frames);
    }

    info!("pausing");
    for view in &views {
        view.owner.on_pause();
    }
    info!("live contexts while paused: {}", egl.live_context_count());

    info!("resuming");
    for view in &views {
        view.owner.on_resume();
        view.draw_frames(frames);
    }

    info!("detaching");
    for view in &mut views {
        view.owner.on_surface_destroyed();
        view.owner.on_detached_from_window().unwrap();
    }

    for (index, view) in views.iter().enumerate() {
        info!("view {} drew {} frames", index, view.frames.load(Ordering::SeqCst));
    }
    info!(
        "{} swaps, peak of {} live contexts",
        egl.swap_count(),
        egl.peak_context_count()
    );
}
