//! Small URI helpers for glTF-relative references.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::{Position, Url};

/// Decodes a `data:` URI. Only base64 payloads are accepted.
pub(crate) fn decode_data_uri(uri: &str) -> Option<Result<Vec<u8>, base64::DecodeError>> {
    let rest = uri.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    Some(STANDARD.decode(payload))
}

/// Stand-in origin for joining app-relative paths with [`Url::join`].
const LOCAL_ORIGIN: &str = "http://vitrine.invalid/";

/// Resolves `reference` relative to the document at `base`.
///
/// Absolute bases are joined as URLs. App-relative bases (`/dir/a.gltf`,
/// `./dir/a.gltf`, `dir/a.gltf`) are joined against a placeholder origin and
/// come back in the same form. Dot segments never climb above the root.
pub(crate) fn join(base: &str, reference: &str) -> String {
    if let Ok(base_url) = Url::parse(base) {
        return match base_url.join(reference) {
            Ok(joined) => joined.into(),
            Err(err) => {
                log::debug!("cannot resolve {reference:?} against {base}: {err}");
                reference.to_owned()
            }
        };
    }

    let Ok(origin) = Url::parse(LOCAL_ORIGIN) else {
        return reference.to_owned();
    };
    let joined = match origin.join(base).and_then(|doc| doc.join(reference)) {
        Ok(joined) => joined,
        Err(err) => {
            log::debug!("cannot resolve {reference:?} against {base}: {err}");
            return reference.to_owned();
        }
    };
    if joined.origin() != origin.origin() {
        return joined.into();
    }

    let path = &joined[Position::BeforePath..];
    if base.starts_with('/') || reference.starts_with('/') {
        path.to_owned()
    } else if base.starts_with("./") {
        format!(".{path}")
    } else {
        path.trim_start_matches('/').to_owned()
    }
}
