/// Why an asset could not be turned into a scene.
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("empty asset reference")]
    InvalidReference,

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to parse glTF: {0}")]
    Parse(#[from] gltf::Error),

    #[error("glTF document has no scene")]
    EmptyScene,

    #[error("glTF buffer {index}: {reason}")]
    Buffer { index: usize, reason: String },

    #[error("glTF buffer view {view} could not be decompressed: {reason}")]
    Decompress { view: usize, reason: String },

    #[error("glTF image {index}: {reason}")]
    Image { index: usize, reason: String },
}

impl AssetLoadError {
    pub(crate) fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }
}
