use std::panic::{self, AssertUnwindSafe};

/// One uploaded mesh instance with its per-draw bindings.
pub(super) struct GpuDraw {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
    pub uniform: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

pub(super) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Outcome of releasing per-request GPU objects.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DisposalReport {
    pub released: usize,
    pub failed: usize,
}

/// Per-request GPU objects (geometry, material uniforms, textures).
///
/// Release is tied to scope: everything is destroyed when the value is
/// dropped, on success and error paths alike. The shared surface and the
/// renderer's pipeline are never owned here.
pub struct GpuScene {
    pub(super) draws: Vec<GpuDraw>,
    pub(super) textures: Vec<GpuTexture>,
}

impl GpuScene {
    pub(super) fn new() -> Self {
        Self {
            draws: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Destroys all owned GPU objects. Safe to call more than once.
    ///
    /// Individual failures are logged and counted, never propagated.
    pub fn dispose(&mut self) -> DisposalReport {
        let mut report = DisposalReport::default();

        for draw in self.draws.drain(..) {
            release(&mut report, "vertex buffer", || draw.vertex.destroy());
            release(&mut report, "index buffer", || draw.index.destroy());
            release(&mut report, "material uniform", || draw.uniform.destroy());
        }
        for tex in self.textures.drain(..) {
            release(&mut report, "texture", || tex.texture.destroy());
        }

        report
    }
}

impl Drop for GpuScene {
    fn drop(&mut self) {
        let report = self.dispose();
        if report.failed > 0 {
            log::warn!(
                "released {} GPU objects, {} could not be released",
                report.released,
                report.failed
            );
        } else if report.released > 0 {
            log::trace!("released {} GPU objects", report.released);
        }
    }
}

fn release(report: &mut DisposalReport, what: &str, f: impl FnOnce()) {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => report.released += 1,
        Err(_) => {
            report.failed += 1;
            log::warn!("failed to release {what}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_counts_successes_and_failures() {
        let mut report = DisposalReport::default();
        release(&mut report, "ok", || {});
        release(&mut report, "boom", || panic!("destroy failed"));
        release(&mut report, "ok", || {});
        assert_eq!(report, DisposalReport { released: 2, failed: 1 });
    }

    #[test]
    fn empty_scene_disposes_to_nothing() {
        let mut scene = GpuScene::new();
        assert_eq!(scene.dispose(), DisposalReport::default());
        assert_eq!(scene.dispose(), DisposalReport::default());
    }
}
