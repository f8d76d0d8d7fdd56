//! Platform-specific backends.
//!
//! Native drivers implement `Egl` outside this crate; the headless backend lives here for
//! testing and for running a render thread without a display server.

pub mod headless;
