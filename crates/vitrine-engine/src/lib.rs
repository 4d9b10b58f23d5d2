//! Vitrine engine crate.
//!
//! This crate owns the GPU runtime pieces used by the thumbnail service:
//! a headless device, the shared offscreen surface, and the mesh renderer
//! that turns a CPU-side [`scene::ModelScene`] into an encoded image.

pub mod device;
pub mod surface;
pub mod render;
pub mod scene;
pub mod paint;

pub mod logging;
