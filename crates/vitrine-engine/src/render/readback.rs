use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};

/// Row layout of a texture copied into a mappable buffer.
///
/// wgpu requires `bytes_per_row` to be a multiple of
/// `COPY_BYTES_PER_ROW_ALIGNMENT`, so rows carry trailing padding.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ReadbackLayout {
    pub width: u32,
    pub height: u32,
    pub unpadded_bytes_per_row: u32,
    pub padded_bytes_per_row: u32,
}

impl ReadbackLayout {
    const BYTES_PER_PIXEL: u32 = 4;

    pub fn new(width: u32, height: u32) -> Self {
        let unpadded = width * Self::BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        Self {
            width,
            height,
            unpadded_bytes_per_row: unpadded,
            padded_bytes_per_row: unpadded.div_ceil(align) * align,
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.padded_bytes_per_row as u64 * self.height as u64
    }
}

/// Tightly packed RGBA8 pixels read back from the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Removes per-row padding from mapped buffer contents.
pub fn strip_row_padding(data: &[u8], layout: ReadbackLayout) -> Vec<u8> {
    let row = layout.unpadded_bytes_per_row as usize;
    let stride = layout.padded_bytes_per_row as usize;
    let mut out = Vec::with_capacity(row * layout.height as usize);
    for chunk in data.chunks(stride).take(layout.height as usize) {
        out.extend_from_slice(&chunk[..row.min(chunk.len())]);
    }
    out
}

/// Maps `buffer`, copies its pixels out and unmaps it again.
///
/// Blocks the calling context until the GPU finished the submitted copy; the
/// render step is synchronous by contract.
pub fn read_frame(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
    layout: ReadbackLayout,
) -> Result<RgbaFrame> {
    let slice = buffer.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    wait_for_mapping(
        || {
            device
                .poll(wgpu::PollType::wait_indefinitely())
                .map(drop)
                .map_err(|e| anyhow!("failed to poll device: {e}"))
        },
        &receiver,
    )?;

    let pixels = {
        let view = slice.get_mapped_range();
        strip_row_padding(&view, layout)
    };
    buffer.unmap();

    Ok(RgbaFrame {
        width: layout.width,
        height: layout.height,
        pixels,
    })
}

/// Blocks in `wait` until the device is idle, then takes the map result the
/// callback sent. The callback has run by the time `wait` returns.
fn wait_for_mapping<E>(
    wait: impl FnOnce() -> Result<()>,
    receiver: &mpsc::Receiver<Result<(), E>>,
) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    wait()?;
    let mapped = receiver
        .recv()
        .map_err(|_| anyhow!("readback callback dropped before completion"))?;
    mapped.context("failed to map readback buffer")
}
