use vitrine_assets::AssetLoadError;
use vitrine_engine::surface::SurfaceError;

/// Why a render attempt produced no thumbnail.
///
/// These never reach callers of [`crate::Thumbnails::ensure`]; the scheduler
/// logs them and caches [`crate::Thumbnail::Unavailable`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),

    #[error("render failed: {0:#}")]
    Render(anyhow::Error),
}

impl From<SurfaceError> for ThumbnailError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::Unsupported(reason) => Self::UnsupportedEnvironment(reason),
            SurfaceError::Render(err) => Self::Render(err),
        }
    }
}
