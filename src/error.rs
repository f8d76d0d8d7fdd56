// glthread/src/error.rs
//
//! Various errors that methods can produce.

/// Various errors that methods can produce.
#[derive(Debug)]
pub enum Error {
    /// A connection to the native display could not be obtained.
    ConnectionFailed(WindowingApiError),
    /// The native display could not be initialized.
    InitializationFailed(WindowingApiError),
    /// Choosing a pixel format (EGL config) failed.
    PixelFormatSelectionFailed(WindowingApiError),
    /// The system couldn't choose a pixel format matching the requested attributes.
    NoPixelFormatFound,
    /// The system couldn't create a context.
    ContextCreationFailed(WindowingApiError),
    /// The system couldn't destroy a context.
    ContextDestructionFailed(WindowingApiError),
    /// The surface owner was dropped before the render thread could read its configuration.
    NoOwner,
    /// Configuration was changed after the render thread had been started.
    RenderThreadAlreadyStarted,
    /// The operating system refused to spawn the render thread.
    ThreadSpawnFailed,
    /// The render thread panicked.
    RenderThreadPanicked,
}

/// Abstraction of the errors that EGL and similar windowing APIs return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowingApiError {
    /// Miscellaneous error.
    Failed,
    /// EGL is not initialized, or could not be initialized, for the specified display.
    NotInitialized,
    /// EGL cannot access a requested resource (for example a context is bound in another
    /// thread).
    BadAccess,
    /// EGL failed to allocate resources for the requested operation.
    BadAlloc,
    /// An unrecognized attribute or attribute value was passed in the attribute list.
    BadAttribute,
    /// The EGL configuration is unsupported.
    BadConfig,
    /// An EGLContext argument does not name a valid EGL rendering context.
    BadContext,
    /// The current surface of the calling thread is a window, pixel buffer or pixmap that is
    /// no longer valid.
    BadCurrentSurface,
    /// An EGLDisplay argument does not name a valid EGL display connection.
    BadDisplay,
    /// Arguments are inconsistent (for example, a valid context requires buffers not supplied
    /// by a valid surface).
    BadMatch,
    /// A NativePixmapType argument does not refer to a valid native pixmap.
    BadNativePixmap,
    /// A NativeWindowType argument does not refer to a valid native window.
    BadNativeWindow,
    /// One or more argument values are invalid.
    BadParameter,
    /// An EGLSurface argument does not name a valid surface configured for GL rendering.
    BadSurface,
    /// A power management event has occurred. The application must destroy all contexts and
    /// reinitialise OpenGL ES state and objects to continue rendering.
    ContextLost,
}

/// Raw EGL error codes, as returned by `eglGetError()`.
pub mod egl_codes {
    pub const SUCCESS: i32 = 0x3000;
    pub const NOT_INITIALIZED: i32 = 0x3001;
    pub const BAD_ACCESS: i32 = 0x3002;
    pub const BAD_ALLOC: i32 = 0x3003;
    pub const BAD_ATTRIBUTE: i32 = 0x3004;
    pub const BAD_CONFIG: i32 = 0x3005;
    pub const BAD_CONTEXT: i32 = 0x3006;
    pub const BAD_CURRENT_SURFACE: i32 = 0x3007;
    pub const BAD_DISPLAY: i32 = 0x3008;
    pub const BAD_MATCH: i32 = 0x3009;
    pub const BAD_NATIVE_PIXMAP: i32 = 0x300A;
    pub const BAD_NATIVE_WINDOW: i32 = 0x300B;
    pub const BAD_PARAMETER: i32 = 0x300C;
    pub const BAD_SURFACE: i32 = 0x300D;
    pub const CONTEXT_LOST: i32 = 0x300E;
}

/// Translation of raw EGL error codes to `WindowingApiError`s.
///
/// Backends that wrap a real EGL implementation use this to convert the result of
/// `eglGetError()`.
pub trait ToWindowingApiError {
    fn to_windowing_api_error(self) -> WindowingApiError;
}

impl ToWindowingApiError for i32 {
    fn to_windowing_api_error(self) -> WindowingApiError {
        match self {
            egl_codes::NOT_INITIALIZED => WindowingApiError::NotInitialized,
            egl_codes::BAD_ACCESS => WindowingApiError::BadAccess,
            egl_codes::BAD_ALLOC => WindowingApiError::BadAlloc,
            egl_codes::BAD_ATTRIBUTE => WindowingApiError::BadAttribute,
            egl_codes::BAD_CONFIG => WindowingApiError::BadConfig,
            egl_codes::BAD_CONTEXT => WindowingApiError::BadContext,
            egl_codes::BAD_CURRENT_SURFACE => WindowingApiError::BadCurrentSurface,
            egl_codes::BAD_DISPLAY => WindowingApiError::BadDisplay,
            egl_codes::BAD_MATCH => WindowingApiError::BadMatch,
            egl_codes::BAD_NATIVE_PIXMAP => WindowingApiError::BadNativePixmap,
            egl_codes::BAD_NATIVE_WINDOW => WindowingApiError::BadNativeWindow,
            egl_codes::BAD_PARAMETER => WindowingApiError::BadParameter,
            egl_codes::BAD_SURFACE => WindowingApiError::BadSurface,
            egl_codes::CONTEXT_LOST => WindowingApiError::ContextLost,
            _ => WindowingApiError::Failed,
        }
    }
}
