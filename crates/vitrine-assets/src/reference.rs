//! Asset references and the application base path.
//!
//! The raw reference string is the identity of an asset everywhere else
//! (cache keys, deduplication). Resolution only produces the URL to fetch.

use std::path::PathBuf;

/// Directory (under the base path) that bare file names live in.
pub const MODELS_DIR: &str = "models";

/// Environment variable holding the application base path.
pub const BASE_ENV: &str = "VITRINE_BASE";

/// Environment variable holding the directory that serves the base path.
pub const ROOT_ENV: &str = "VITRINE_ASSET_ROOT";

/// Resolves a raw asset reference into a fetchable URL.
///
/// - absolute `http(s)` URLs and `/`, `./`, `../` prefixed paths pass through
/// - references containing a `/` are anchored at `base`
/// - bare file names go to `<base>/models/<name>`; a base of `/` becomes `.`
pub fn resolve_model_url(raw: &str, base: &str) -> String {
    let u = raw.trim();
    if u.is_empty() {
        return String::new();
    }
    if u.starts_with("http://") || u.starts_with("https://") {
        return u.to_owned();
    }
    if u.starts_with('/') || u.starts_with("./") || u.starts_with("../") {
        return u.to_owned();
    }

    if u.contains('/') {
        let base = if base.ends_with('/') { base.to_owned() } else { format!("{base}/") };
        return format!("{base}{}", u.trim_start_matches('/'));
    }

    let root = if base == "/" { "." } else { base.trim_end_matches('/') };
    format!("{root}/{MODELS_DIR}/{u}")
}

/// Normalizes a configured base path.
///
/// Empty → `/`. Absolute URLs and `/`, `./`, `../` prefixed values are kept
/// as written; anything else gains a leading `/`.
pub fn normalize_base(base: Option<&str>) -> String {
    let b = base.unwrap_or("").trim();
    if b.is_empty() {
        return "/".to_owned();
    }
    if b.starts_with("http://") || b.starts_with("https://") {
        return b.to_owned();
    }
    if b.starts_with('/') || b.starts_with("./") || b.starts_with("../") {
        return b.to_owned();
    }
    format!("/{b}")
}

/// Where assets are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    /// Application base path (normalized).
    pub base: String,
    /// Local directory that corresponds to `base`.
    pub root: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            base: "/".to_owned(),
            root: PathBuf::from("."),
        }
    }
}

impl AssetConfig {
    pub fn new(base: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            base: normalize_base(Some(base)),
            root: root.into(),
        }
    }

    /// Reads [`BASE_ENV`] and [`ROOT_ENV`]; unset values keep their defaults.
    pub fn from_env() -> Self {
        let base = std::env::var(BASE_ENV).ok();
        let root = std::env::var_os(ROOT_ENV).map(PathBuf::from);
        let config = Self {
            base: normalize_base(base.as_deref()),
            root: root.unwrap_or_else(|| PathBuf::from(".")),
        };
        log::debug!("asset config: base={} root={}", config.base, config.root.display());
        config
    }

    pub fn resolve(&self, raw: &str) -> String {
        resolve_model_url(raw, &self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── resolve_model_url ─────────────────────────────────────────────────

    #[test]
    fn absolute_urls_pass_through() {
        let url = "https://cdn.example.com/a.glb";
        assert_eq!(resolve_model_url(url, "/gallery/"), url);
        assert_eq!(resolve_model_url("http://x/y.glb", "/"), "http://x/y.glb");
    }

    #[test]
    fn rooted_and_dot_relative_paths_pass_through() {
        assert_eq!(resolve_model_url("/models/a.glb", "/gallery/"), "/models/a.glb");
        assert_eq!(resolve_model_url("./a.glb", "/gallery/"), "./a.glb");
        assert_eq!(resolve_model_url("../a.glb", "/gallery/"), "../a.glb");
    }

    #[test]
    fn nested_paths_are_anchored_at_base() {
        assert_eq!(resolve_model_url("assets/a.glb", "/gallery/"), "/gallery/assets/a.glb");
        assert_eq!(resolve_model_url("assets/a.glb", "/"), "/assets/a.glb");
        assert_eq!(resolve_model_url("assets/a.glb", "/gallery"), "/gallery/assets/a.glb");
    }

    #[test]
    fn bare_names_go_to_models_dir() {
        assert_eq!(resolve_model_url("model-a.glb", "/"), "./models/model-a.glb");
        assert_eq!(resolve_model_url("model-a.glb", "/gallery/"), "/gallery/models/model-a.glb");
        assert_eq!(
            resolve_model_url("model-a.glb", "https://cdn.example.com/site/"),
            "https://cdn.example.com/site/models/model-a.glb"
        );
    }

    #[test]
    fn whitespace_is_trimmed_and_empty_stays_empty() {
        assert_eq!(resolve_model_url("  model-a.glb ", "/"), "./models/model-a.glb");
        assert_eq!(resolve_model_url("   ", "/"), "");
    }

    // ── normalize_base ────────────────────────────────────────────────────

    #[test]
    fn base_defaults_to_root() {
        assert_eq!(normalize_base(None), "/");
        assert_eq!(normalize_base(Some("  ")), "/");
    }

    #[test]
    fn base_gains_leading_slash() {
        assert_eq!(normalize_base(Some("my-3d-gallery/")), "/my-3d-gallery/");
    }

    #[test]
    fn base_keeps_explicit_forms() {
        assert_eq!(normalize_base(Some("./")), "./");
        assert_eq!(normalize_base(Some("/sub/")), "/sub/");
        assert_eq!(normalize_base(Some("https://x.io/app/")), "https://x.io/app/");
    }

    #[test]
    fn config_resolves_with_its_base() {
        let cfg = AssetConfig::new("gallery/", "/srv/www");
        assert_eq!(cfg.base, "/gallery/");
        assert_eq!(cfg.resolve("a.glb"), "/gallery/models/a.glb");
    }
}
