use std::ffi::c_void;

use meshopt::ffi;
use serde::Deserialize;

use crate::error::AssetLoadError;

pub(crate) const EXT_MESHOPT_COMPRESSION: &str = "EXT_meshopt_compression";

/// The `EXT_meshopt_compression` object of a buffer view.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeshoptView {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: usize,
    count: usize,
    mode: Mode,
    #[serde(default)]
    filter: Filter,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum Mode {
    Attributes,
    Triangles,
    Indices,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum Filter {
    #[default]
    None,
    Octahedral,
    Quaternion,
    Exponential,
}

/// True for a buffer that only reserves space for decompressed views.
pub(crate) fn is_fallback_buffer(buffer: &gltf::Buffer<'_>) -> bool {
    buffer
        .extension_value(EXT_MESHOPT_COMPRESSION)
        .and_then(|ext| ext.get("fallback"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Decodes every compressed view into its place in the fallback buffer.
pub(crate) fn decompress_views(
    document: &gltf::Document,
    buffers: &mut [Vec<u8>],
) -> Result<usize, AssetLoadError> {
    let mut decoded = 0;
    for view in document.views() {
        let Some(ext) = view.extension_value(EXT_MESHOPT_COMPRESSION) else {
            continue;
        };
        let fail = |reason: String| AssetLoadError::Decompress {
            view: view.index(),
            reason,
        };

        let params = MeshoptView::deserialize(ext).map_err(|e| fail(e.to_string()))?;
        let source = buffers
            .get(params.buffer)
            .ok_or_else(|| fail(format!("buffer {} does not exist", params.buffer)))?;
        let bytes = decode(&params, source).map_err(fail)?;

        let start = view.offset();
        let target = buffers
            .get_mut(view.buffer().index())
            .and_then(|b| b.get_mut(start..start + view.length()))
            .ok_or_else(|| fail("view lies outside its fallback buffer".into()))?;
        if target.len() != bytes.len() {
            return Err(fail(format!(
                "decoded {} bytes into a {} byte view",
                bytes.len(),
                target.len()
            )));
        }
        target.copy_from_slice(&bytes);
        decoded += 1;
    }
    Ok(decoded)
}

/// Checks the stride and count rules the decoders assume.
fn validate(params: &MeshoptView) -> Result<(), String> {
    let stride = params.byte_stride;
    match params.mode {
        Mode::Attributes => {
            if stride == 0 || stride > 256 || stride % 4 != 0 {
                return Err(format!("attribute stride {stride} is not a multiple of 4 up to 256"));
            }
        }
        Mode::Triangles | Mode::Indices => {
            if stride != 2 && stride != 4 {
                return Err(format!("index stride {stride} must be 2 or 4"));
            }
            if params.mode == Mode::Triangles && params.count % 3 != 0 {
                return Err(format!("{} indices do not form triangles", params.count));
            }
        }
    }

    let filter_ok = match params.filter {
        Filter::None => true,
        _ if params.mode != Mode::Attributes => false,
        Filter::Octahedral => stride == 4 || stride == 8,
        Filter::Quaternion => stride == 8,
        Filter::Exponential => stride % 4 == 0,
    };
    if !filter_ok {
        return Err(format!(
            "{:?} filter cannot apply to {:?} data with stride {stride}",
            params.filter, params.mode
        ));
    }
    Ok(())
}

fn decode(params: &MeshoptView, source: &[u8]) -> Result<Vec<u8>, String> {
    validate(params)?;
    let input = params
        .byte_offset
        .checked_add(params.byte_length)
        .and_then(|end| source.get(params.byte_offset..end))
        .ok_or("compressed range is out of bounds")?;
    let size = params
        .count
        .checked_mul(params.byte_stride)
        .ok_or("decoded size overflows")?;

    let mut out = vec![0u8; size];
    let dst = out.as_mut_ptr().cast::<c_void>();
    // SAFETY: `out` holds exactly `count * stride` bytes and `input` is a
    // live slice; strides and counts were checked against the decoder
    // preconditions above.
    let status = unsafe {
        match params.mode {
            Mode::Attributes => ffi::meshopt_decodeVertexBuffer(
                dst,
                params.count,
                params.byte_stride,
                input.as_ptr(),
                input.len(),
            ),
            Mode::Triangles => ffi::meshopt_decodeIndexBuffer(
                dst,
                params.count,
                params.byte_stride,
                input.as_ptr(),
                input.len(),
            ),
            Mode::Indices => ffi::meshopt_decodeIndexSequence(
                dst,
                params.count,
                params.byte_stride,
                input.as_ptr(),
                input.len(),
            ),
        }
    };
    if status != 0 {
        return Err(format!("meshopt decoder rejected the data ({status})"));
    }

    // SAFETY: same buffer as above; the filter/stride pairing was validated.
    unsafe {
        match params.filter {
            Filter::None => {}
            Filter::Octahedral => {
                ffi::meshopt_decodeFilterOct(dst, params.count, params.byte_stride)
            }
            Filter::Quaternion => {
                ffi::meshopt_decodeFilterQuat(dst, params.count, params.byte_stride)
            }
            Filter::Exponential => {
                ffi::meshopt_decodeFilterExp(dst, params.count, params.byte_stride)
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: Mode, stride: usize, count: usize, len: usize) -> MeshoptView {
        MeshoptView {
            buffer: 0,
            byte_offset: 0,
            byte_length: len,
            byte_stride: stride,
            count,
            mode,
            filter: Filter::None,
        }
    }

    #[test]
    fn parses_extension_object() {
        let json = serde_json::json!({
            "buffer": 1, "byteOffset": 8, "byteLength": 40,
            "byteStride": 12, "count": 3, "mode": "ATTRIBUTES", "filter": "OCTAHEDRAL"
        });
        let parsed = MeshoptView::deserialize(&json).unwrap();
        assert_eq!(parsed.buffer, 1);
        assert_eq!(parsed.byte_offset, 8);
        assert_eq!(parsed.mode, Mode::Attributes);
        assert_eq!(parsed.filter, Filter::Octahedral);

        let minimal = serde_json::json!({
            "buffer": 0, "byteLength": 4, "byteStride": 4, "count": 3, "mode": "TRIANGLES"
        });
        let parsed = MeshoptView::deserialize(&minimal).unwrap();
        assert_eq!(parsed.byte_offset, 0);
        assert_eq!(parsed.filter, Filter::None);
    }

    #[test]
    fn vertex_round_trip_through_encoder() {
        let vertices: Vec<[f32; 3]> = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let encoded = meshopt::encode_vertex_buffer(&vertices).unwrap();

        let decoded = decode(&params(Mode::Attributes, 12, 3, encoded.len()), &encoded).unwrap();
        let expected: Vec<u8> = vertices.iter().flatten().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn index_round_trip_through_encoder() {
        let indices = [0u32, 1, 2, 2, 1, 3];
        let encoded = meshopt::encode_index_buffer(&indices, 4).unwrap();

        let decoded = decode(&params(Mode::Triangles, 4, 6, encoded.len()), &encoded).unwrap();
        let expected: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let vertices: Vec<[f32; 3]> = vec![[0.5, 0.25, 1.0]; 16];
        let encoded = meshopt::encode_vertex_buffer(&vertices).unwrap();
        let short = &encoded[..encoded.len() / 2];
        assert!(decode(&params(Mode::Attributes, 12, 16, short.len()), short).is_err());
    }

    #[test]
    fn range_outside_source_is_rejected() {
        let err = decode(&params(Mode::Attributes, 12, 3, 64), &[0u8; 8]).unwrap_err();
        assert!(err.contains("out of bounds"));
    }

    #[test]
    fn invalid_strides_never_reach_the_decoder() {
        assert!(validate(&params(Mode::Attributes, 6, 3, 0)).is_err());
        assert!(validate(&params(Mode::Attributes, 260, 3, 0)).is_err());
        assert!(validate(&params(Mode::Triangles, 4, 4, 0)).is_err());
        assert!(validate(&params(Mode::Indices, 1, 4, 0)).is_err());

        let quat = MeshoptView {
            filter: Filter::Quaternion,
            ..params(Mode::Attributes, 4, 3, 0)
        };
        assert!(validate(&quat).is_err());
        let filtered_indices = MeshoptView {
            filter: Filter::Exponential,
            ..params(Mode::Indices, 4, 3, 0)
        };
        assert!(validate(&filtered_indices).is_err());
        let oct = MeshoptView {
            filter: Filter::Octahedral,
            ..params(Mode::Attributes, 8, 3, 0)
        };
        assert!(validate(&oct).is_ok());
    }
}
