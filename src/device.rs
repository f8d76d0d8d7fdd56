// glthread/src/device.rs
//
//! The abstract interface that native EGL implementations conform to.

use crate::gl_info::GlInfo;
use crate::WindowingApiError;

/// `EGL_OPENGL_ES2_BIT`, for use with `ConfigAttrib::RenderableType`.
pub const OPENGL_ES2_BIT: i32 = 0x0004;
/// `EGL_OPENGL_ES3_BIT_KHR`, for use with `ConfigAttrib::RenderableType`.
pub const OPENGL_ES3_BIT: i32 = 0x0040;

/// The framebuffer config attributes that config choosers request and query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigAttrib {
    RedSize,
    GreenSize,
    BlueSize,
    AlphaSize,
    DepthSize,
    StencilSize,
    /// A bitmask of client APIs the config supports (`OPENGL_ES2_BIT`, ...).
    RenderableType,
}

/// A list of requested attribute values, in the order they were added.
///
/// Size attributes are minimums; `RenderableType` is a mask that must be fully supported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigSpec {
    attributes: Vec<(ConfigAttrib, i32)>,
}

impl ConfigSpec {
    #[inline]
    pub fn new() -> ConfigSpec {
        ConfigSpec::default()
    }

    /// Appends an attribute, replacing any earlier value for the same attribute.
    pub fn with(mut self, attrib: ConfigAttrib, value: i32) -> ConfigSpec {
        self.attributes.retain(|&(existing, _)| existing != attrib);
        self.attributes.push((attrib, value));
        self
    }

    #[inline]
    pub fn get(&self, attrib: ConfigAttrib) -> Option<i32> {
        self.attributes
            .iter()
            .find(|&&(existing, _)| existing == attrib)
            .map(|&(_, value)| value)
    }

    #[inline]
    pub fn attributes(&self) -> &[(ConfigAttrib, i32)] {
        &self.attributes
    }
}

/// A handle to a native EGL implementation.
///
/// Every method corresponds to one native entry point. Implementations must be shareable
/// between the UI thread and the render threads; the handles they hand out are only ever used
/// by the render thread that created them.
pub trait Egl: Send + Sync + 'static {
    /// A display connection (`EGLDisplay`).
    type Display: Clone + Send;
    /// A framebuffer configuration (`EGLConfig`).
    type Config: Clone + Send;
    /// A rendering context (`EGLContext`).
    type Context: Send;
    /// A window surface (`EGLSurface`).
    type Surface: Send;
    /// The platform window a surface renders into.
    type NativeWindow: Clone + Send;
    /// The GL function table handed to the renderer.
    type Gl: GlInfo;

    /// Returns the default display (`eglGetDisplay(EGL_DEFAULT_DISPLAY)`).
    fn get_display(&self) -> Result<Self::Display, WindowingApiError>;

    /// Initializes the display (`eglInitialize`).
    fn initialize(&self, display: &Self::Display) -> Result<(), WindowingApiError>;

    /// Releases every resource associated with the display (`eglTerminate`).
    fn terminate(&self, display: &Self::Display);

    /// Returns every config satisfying `spec` (`eglChooseConfig`).
    fn choose_configs(
        &self,
        display: &Self::Display,
        spec: &ConfigSpec,
    ) -> Result<Vec<Self::Config>, WindowingApiError>;

    /// Reads one attribute of a config (`eglGetConfigAttrib`).
    fn config_attrib(
        &self,
        display: &Self::Display,
        config: &Self::Config,
        attrib: ConfigAttrib,
    ) -> Option<i32>;

    /// Creates a context (`eglCreateContext`). `client_version` is passed as
    /// `EGL_CONTEXT_CLIENT_VERSION` when present.
    fn create_context(
        &self,
        display: &Self::Display,
        config: &Self::Config,
        client_version: Option<u8>,
    ) -> Result<Self::Context, WindowingApiError>;

    /// Destroys a context (`eglDestroyContext`).
    fn destroy_context(
        &self,
        display: &Self::Display,
        context: Self::Context,
    ) -> Result<(), WindowingApiError>;

    /// Creates a window surface (`eglCreateWindowSurface`).
    fn create_window_surface(
        &self,
        display: &Self::Display,
        config: &Self::Config,
        native_window: &Self::NativeWindow,
    ) -> Result<Self::Surface, WindowingApiError>;

    /// Destroys a window surface (`eglDestroySurface`).
    fn destroy_surface(
        &self,
        display: &Self::Display,
        surface: Self::Surface,
    ) -> Result<(), WindowingApiError>;

    /// Binds the surface and context to the calling thread, or unbinds whatever is bound if
    /// `binding` is `None` (`eglMakeCurrent`).
    fn make_current(
        &self,
        display: &Self::Display,
        binding: Option<(&Self::Surface, &Self::Context)>,
    ) -> Result<(), WindowingApiError>;

    /// Presents the surface (`eglSwapBuffers`).
    fn swap_buffers(
        &self,
        display: &Self::Display,
        surface: &Self::Surface,
    ) -> Result<(), WindowingApiError>;

    /// Returns the GL function table for the context current on this thread.
    fn create_gl(&self, context: &Self::Context) -> Self::Gl;
}
