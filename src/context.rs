// glthread/src/context.rs
//
//! Declarations shared by everything that creates contexts.

use bitflags::bitflags;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

bitflags! {
    /// Extra checking performed by the render thread around renderer callbacks.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DebugFlags: u32 {
        /// Check `glGetError()` after every frame and log any error.
        const CHECK_GL_ERROR = 0x01;
        /// Log every renderer callback.
        const LOG_GL_CALLS   = 0x02;
    }
}

/// The requested `EGL_CONTEXT_CLIENT_VERSION`.
///
/// Shared between the owner, the config chooser and the context factory, so that a fallback
/// performed by the factory is seen by everyone. Zero means "do not request a version".
#[derive(Debug, Default)]
pub struct ClientVersion(AtomicU8);

impl ClientVersion {
    #[inline]
    pub fn new(major: u8) -> ClientVersion {
        ClientVersion(AtomicU8::new(major))
    }

    #[inline]
    pub fn get(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn set(&self, major: u8) {
        self.0.store(major, Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub(crate) struct AtomicDebugFlags(AtomicU32);

impl AtomicDebugFlags {
    #[inline]
    pub(crate) fn get(&self) -> DebugFlags {
        DebugFlags::from_bits_truncate(self.0.load(Ordering::SeqCst))
    }

    #[inline]
    pub(crate) fn set(&self, flags: DebugFlags) {
        self.0.store(flags.bits(), Ordering::SeqCst)
    }
}
