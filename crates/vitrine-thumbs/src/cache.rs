use std::collections::HashMap;
use std::sync::Arc;

/// Settled outcome for one asset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    /// Encoded image (`data:image/png;base64,...`).
    Image(Arc<str>),
    /// The attempt finished without an image. Cached like a success.
    Unavailable,
}

impl Thumbnail {
    pub fn image(&self) -> Option<&str> {
        match self {
            Thumbnail::Image(url) => Some(url),
            Thumbnail::Unavailable => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Thumbnail::Image(_))
    }
}

/// Asset reference → settled outcome. Grows for the life of the service.
///
/// Keys are compared as raw strings; `a.glb` and `./a.glb` are distinct.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<String, Thumbnail>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Thumbnail> {
        self.entries.get(key)
    }

    /// Last write wins.
    pub fn set(&mut self, key: impl Into<String>, value: Thumbnail) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_attempted() {
        let cache = ResultCache::new();
        assert_eq!(cache.get("a.glb"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn failure_is_a_cached_value() {
        let mut cache = ResultCache::new();
        cache.set("a.glb", Thumbnail::Unavailable);
        assert_eq!(cache.get("a.glb"), Some(&Thumbnail::Unavailable));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_not_normalized() {
        let mut cache = ResultCache::new();
        cache.set("models/a/", Thumbnail::Image("data:x".into()));
        assert_eq!(cache.get("models/a"), None);
        assert_eq!(cache.get("models/a/").and_then(Thumbnail::image), Some("data:x"));
    }

    #[test]
    fn last_write_wins() {
        let mut cache = ResultCache::new();
        cache.set("a", Thumbnail::Unavailable);
        cache.set("a", Thumbnail::Image("data:y".into()));
        assert!(cache.get("a").is_some_and(Thumbnail::is_image));
        assert_eq!(cache.len(), 1);
    }
}
