/// Failure to produce a frame on the shared surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// No usable adapter/device; every later request fails the same way.
    #[error("GPU rendering unavailable: {0}")]
    Unsupported(String),

    /// The surface exists but drawing or readback failed.
    #[error("render failed: {0:#}")]
    Render(#[from] anyhow::Error),
}
