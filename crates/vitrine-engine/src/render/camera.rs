use glam::{Mat4, Vec3};

use crate::scene::Aabb;

/// Vertical field of view used for every thumbnail.
pub const FOV_Y_DEGREES: f32 = 50.0;

/// Camera placement that frames a bounding box from a fixed 3/4 elevated angle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraFrame {
    pub eye: Vec3,
    pub target: Vec3,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl CameraFrame {
    /// Frames `bounds`:
    /// - `size` is the box diagonal, `center` its midpoint
    /// - clip planes scale with size: `near = max(size/100, 0.01)`, `far = max(size*100, 10)`
    /// - the eye sits at `center + (size/2, size/5, size/2)` looking at `center`
    ///
    /// Returns `None` for degenerate (zero or non-finite) bounds, which would
    /// place the eye on its own target.
    pub fn around(bounds: &Aabb, aspect: f32) -> Option<Self> {
        let size = bounds.diagonal();
        if !size.is_finite() || size <= 0.0 {
            return None;
        }
        let center = bounds.center();

        Some(Self {
            eye: center + Vec3::new(size / 2.0, size / 5.0, size / 2.0),
            target: center,
            near: (size / 100.0).max(0.01),
            far: (size * 100.0).max(10.0),
            aspect: if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 },
        })
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}
