// glthread/src/platform/headless.rs
//
//! An in-memory `Egl` implementation.
//!
//! Nothing is rendered. Handles are plain identifiers validated against tables of live objects,
//! so misuse shows up as the same errors a real driver would report. Faults can be injected to
//! simulate torn-down windows, lost contexts and exhausted context slots.

use crate::device::{ConfigAttrib, ConfigSpec, Egl, OPENGL_ES2_BIT, OPENGL_ES3_BIT};
use crate::gl_info::GlInfo;
use crate::WindowingApiError;

use fnv::{FnvHashMap, FnvHashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_RENDERER: &str = "glthread headless renderer";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadlessDisplay(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessConfig {
    pub id: u32,
    pub red_size: i32,
    pub green_size: i32,
    pub blue_size: i32,
    pub alpha_size: i32,
    pub depth_size: i32,
    pub stencil_size: i32,
    pub renderable_type: i32,
}

impl HeadlessConfig {
    fn attrib(&self, attrib: ConfigAttrib) -> i32 {
        match attrib {
            ConfigAttrib::RedSize => self.red_size,
            ConfigAttrib::GreenSize => self.green_size,
            ConfigAttrib::BlueSize => self.blue_size,
            ConfigAttrib::AlphaSize => self.alpha_size,
            ConfigAttrib::DepthSize => self.depth_size,
            ConfigAttrib::StencilSize => self.stencil_size,
            ConfigAttrib::RenderableType => self.renderable_type,
        }
    }

    // Sizes are minimums and the renderable type is a mask, as for `eglChooseConfig`.
    fn satisfies(&self, spec: &ConfigSpec) -> bool {
        spec.attributes().iter().all(|&(attrib, value)| match attrib {
            ConfigAttrib::RenderableType => self.renderable_type & value == value,
            _ => self.attrib(attrib) >= value,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessContext {
    id: u32,
    client_version: Option<u8>,
}

impl HeadlessContext {
    #[inline]
    pub fn client_version(&self) -> Option<u8> {
        self.client_version
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessSurface {
    id: u32,
    window: HeadlessWindow,
}

/// A fake platform window, created with `HeadlessEgl::create_window`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeadlessWindow(u32);

/// The GL interface handed to renderers.
#[derive(Clone, Debug)]
pub struct HeadlessGl {
    renderer: String,
    context_id: u32,
    error: Arc<AtomicU32>,
}

impl HeadlessGl {
    /// Identifies the context this interface was created for.
    #[inline]
    pub fn context_id(&self) -> u32 {
        self.context_id
    }
}

impl GlInfo for HeadlessGl {
    fn renderer(&self) -> String {
        self.renderer.clone()
    }

    // Reading the error flag clears it.
    fn error(&self) -> u32 {
        self.error.swap(0, Ordering::SeqCst)
    }
}

pub struct HeadlessEgl {
    state: Mutex<HeadlessState>,
    gl_error: Arc<AtomicU32>,
}

struct HeadlessState {
    renderer: String,
    display_available: bool,
    max_client_version: u8,
    max_contexts: Option<usize>,
    configs: Vec<HeadlessConfig>,
    next_id: u32,
    initialized: bool,
    initialize_count: usize,
    terminate_count: usize,
    windows: FnvHashSet<HeadlessWindow>,
    contexts: FnvHashMap<u32, Option<u8>>,
    surfaces: FnvHashMap<u32, HeadlessWindow>,
    peak_context_count: usize,
    context_creation_count: usize,
    swap_count: usize,
    next_swap_error: Option<WindowingApiError>,
}

impl Default for HeadlessEgl {
    fn default() -> HeadlessEgl {
        HeadlessEgl::new()
    }
}

impl HeadlessEgl {
    /// Creates a backend whose driver supports multiple contexts and GLES up to 3.
    pub fn new() -> HeadlessEgl {
        HeadlessEgl::with_renderer(DEFAULT_RENDERER)
    }

    /// Creates a backend reporting `renderer` as its `GL_RENDERER` string.
    pub fn with_renderer(renderer: &str) -> HeadlessEgl {
        HeadlessEgl {
            state: Mutex::new(HeadlessState {
                renderer: renderer.to_owned(),
                display_available: true,
                max_client_version: 3,
                max_contexts: None,
                configs: default_configs(),
                next_id: 1,
                initialized: false,
                initialize_count: 0,
                terminate_count: 0,
                windows: FnvHashSet::default(),
                contexts: FnvHashMap::default(),
                surfaces: FnvHashMap::default(),
                peak_context_count: 0,
                context_creation_count: 0,
                swap_count: 0,
                next_swap_error: None,
            }),
            gl_error: Arc::new(AtomicU32::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Context creation fails for client versions above `version`.
    pub fn set_max_client_version(&self, version: u8) {
        self.lock().max_client_version = version;
    }

    /// Context creation fails with `BAD_ALLOC` once `limit` contexts are alive.
    pub fn set_max_contexts(&self, limit: Option<usize>) {
        self.lock().max_contexts = limit;
    }

    /// Whether `get_display` succeeds.
    pub fn set_display_available(&self, available: bool) {
        self.lock().display_available = available;
    }

    pub fn set_configs(&self, configs: Vec<HeadlessConfig>) {
        self.lock().configs = configs;
    }

    pub fn create_window(&self) -> HeadlessWindow {
        let mut state = self.lock();
        let window = HeadlessWindow(state.next_id());
        state.windows.insert(window);
        window
    }

    /// Destroys a window behind the render thread's back. Surfaces bound to it stop presenting.
    pub fn tear_down_window(&self, window: HeadlessWindow) {
        self.lock().windows.remove(&window);
    }

    /// Makes the next `swap_buffers` call fail with `error`.
    pub fn fail_next_swap(&self, error: WindowingApiError) {
        self.lock().next_swap_error = Some(error);
    }

    /// Raises the GL error flag seen by every `HeadlessGl`.
    pub fn inject_gl_error(&self, error: u32) {
        self.gl_error.store(error, Ordering::SeqCst);
    }

    /// The GL error flag, as it would next be read by `glGetError()`.
    pub fn gl_error(&self) -> u32 {
        self.gl_error.load(Ordering::SeqCst)
    }

    pub fn live_context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    /// The largest number of contexts that were ever alive at once.
    pub fn peak_context_count(&self) -> usize {
        self.lock().peak_context_count
    }

    pub fn context_creation_count(&self) -> usize {
        self.lock().context_creation_count
    }

    /// The client versions of the live contexts.
    pub fn live_context_versions(&self) -> Vec<Option<u8>> {
        self.lock().contexts.values().cloned().collect()
    }

    pub fn live_surface_count(&self) -> usize {
        self.lock().surfaces.len()
    }

    pub fn swap_count(&self) -> usize {
        self.lock().swap_count
    }

    pub fn initialize_count(&self) -> usize {
        self.lock().initialize_count
    }

    pub fn terminate_count(&self) -> usize {
        self.lock().terminate_count
    }
}

impl HeadlessState {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_display(&self, display: &HeadlessDisplay) -> Result<(), WindowingApiError> {
        if display.0 != 0 {
            return Err(WindowingApiError::BadDisplay);
        }
        if !self.initialized {
            return Err(WindowingApiError::NotInitialized);
        }
        Ok(())
    }
}

fn default_configs() -> Vec<HeadlessConfig> {
    let renderable_type = OPENGL_ES2_BIT | OPENGL_ES3_BIT;
    let config = |id, (red_size, green_size, blue_size, alpha_size), depth_size, stencil_size| {
        HeadlessConfig {
            id,
            red_size,
            green_size,
            blue_size,
            alpha_size,
            depth_size,
            stencil_size,
            renderable_type,
        }
    };
    vec![
        config(1, (5, 6, 5, 0), 16, 0),
        config(2, (8, 8, 8, 0), 16, 0),
        config(3, (8, 8, 8, 0), 24, 8),
        config(4, (8, 8, 8, 8), 24, 8),
    ]
}

impl Egl for HeadlessEgl {
    type Display = HeadlessDisplay;
    type Config = HeadlessConfig;
    type Context = HeadlessContext;
    type Surface = HeadlessSurface;
    type NativeWindow = HeadlessWindow;
    type Gl = HeadlessGl;

    fn get_display(&self) -> Result<HeadlessDisplay, WindowingApiError> {
        if self.lock().display_available {
            Ok(HeadlessDisplay(0))
        } else {
            Err(WindowingApiError::BadDisplay)
        }
    }

    fn initialize(&self, display: &HeadlessDisplay) -> Result<(), WindowingApiError> {
        let mut state = self.lock();
        if display.0 != 0 {
            return Err(WindowingApiError::BadDisplay);
        }
        state.initialized = true;
        state.initialize_count += 1;
        Ok(())
    }

    // Terminating also happens on other threads' behalf on real drivers; here live handles simply
    // stay valid until destroyed.
    fn terminate(&self, _: &HeadlessDisplay) {
        self.lock().terminate_count += 1;
    }

    fn choose_configs(
        &self,
        display: &HeadlessDisplay,
        spec: &ConfigSpec,
    ) -> Result<Vec<HeadlessConfig>, WindowingApiError> {
        let state = self.lock();
        state.check_display(display)?;
        Ok(state
            .configs
            .iter()
            .filter(|config| config.satisfies(spec))
            .cloned()
            .collect())
    }

    fn config_attrib(
        &self,
        _: &HeadlessDisplay,
        config: &HeadlessConfig,
        attrib: ConfigAttrib,
    ) -> Option<i32> {
        Some(config.attrib(attrib))
    }

    fn create_context(
        &self,
        display: &HeadlessDisplay,
        _: &HeadlessConfig,
        client_version: Option<u8>,
    ) -> Result<HeadlessContext, WindowingApiError> {
        let mut state = self.lock();
        state.check_display(display)?;
        if client_version.unwrap_or(1) > state.max_client_version {
            return Err(WindowingApiError::BadMatch);
        }
        if let Some(limit) = state.max_contexts {
            if state.contexts.len() >= limit {
                return Err(WindowingApiError::BadAlloc);
            }
        }
        let id = state.next_id();
        state.contexts.insert(id, client_version);
        state.context_creation_count += 1;
        state.peak_context_count = state.peak_context_count.max(state.contexts.len());
        Ok(HeadlessContext { id, client_version })
    }

    fn destroy_context(
        &self,
        _: &HeadlessDisplay,
        context: HeadlessContext,
    ) -> Result<(), WindowingApiError> {
        match self.lock().contexts.remove(&context.id) {
            Some(_) => Ok(()),
            None => Err(WindowingApiError::BadContext),
        }
    }

    fn create_window_surface(
        &self,
        display: &HeadlessDisplay,
        _: &HeadlessConfig,
        native_window: &HeadlessWindow,
    ) -> Result<HeadlessSurface, WindowingApiError> {
        let mut state = self.lock();
        state.check_display(display)?;
        if !state.windows.contains(native_window) {
            return Err(WindowingApiError::BadNativeWindow);
        }
        if state.surfaces.values().any(|window| window == native_window) {
            return Err(WindowingApiError::BadAlloc);
        }
        let id = state.next_id();
        state.surfaces.insert(id, *native_window);
        Ok(HeadlessSurface {
            id,
            window: *native_window,
        })
    }

    fn destroy_surface(
        &self,
        _: &HeadlessDisplay,
        surface: HeadlessSurface,
    ) -> Result<(), WindowingApiError> {
        match self.lock().surfaces.remove(&surface.id) {
            Some(_) => Ok(()),
            None => Err(WindowingApiError::BadSurface),
        }
    }

    fn make_current(
        &self,
        _: &HeadlessDisplay,
        binding: Option<(&HeadlessSurface, &HeadlessContext)>,
    ) -> Result<(), WindowingApiError> {
        let state = self.lock();
        match binding {
            None => Ok(()),
            Some((surface, context)) => {
                if !state.contexts.contains_key(&context.id) {
                    Err(WindowingApiError::BadContext)
                } else if !state.surfaces.contains_key(&surface.id) {
                    Err(WindowingApiError::BadSurface)
                } else if !state.windows.contains(&surface.window) {
                    Err(WindowingApiError::BadNativeWindow)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn swap_buffers(
        &self,
        _: &HeadlessDisplay,
        surface: &HeadlessSurface,
    ) -> Result<(), WindowingApiError> {
        let mut state = self.lock();
        if let Some(error) = state.next_swap_error.take() {
            return Err(error);
        }
        if !state.surfaces.contains_key(&surface.id) {
            return Err(WindowingApiError::BadSurface);
        }
        if !state.windows.contains(&surface.window) {
            return Err(WindowingApiError::BadNativeWindow);
        }
        state.swap_count += 1;
        Ok(())
    }

    fn create_gl(&self, context: &HeadlessContext) -> HeadlessGl {
        HeadlessGl {
            renderer: self.lock().renderer.clone(),
            context_id: context.id,
            error: self.gl_error.clone(),
        }
    }
}
