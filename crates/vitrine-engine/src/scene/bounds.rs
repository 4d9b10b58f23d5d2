use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// Invariant: `min <= max` component-wise for boxes built through the
/// constructors below.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// Smallest box containing every point; `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Bounds of this box after transformation (all eight corners).
    pub fn transformed(&self, m: &Mat4) -> Self {
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];
        // Non-empty by construction.
        let mut out = Self::from_min_max(m.transform_point3(corners[0]), m.transform_point3(corners[0]));
        for c in &corners[1..] {
            let p = m.transform_point3(*c);
            out.min = out.min.min(p);
            out.max = out.max.max(p);
        }
        out
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the box diagonal.
    #[inline]
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_empty_is_none() {
        assert_eq!(Aabb::from_points(std::iter::empty()), None);
    }

    #[test]
    fn from_points_spans_extremes() {
        let b = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.0),
            Vec3::new(-1.0, 3.0, 5.0),
            Vec3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -4.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 5.0));
    }

    #[test]
    fn from_min_max_reorders_components() {
        let b = Aabb::from_min_max(Vec3::new(1.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::ONE);
    }

    #[test]
    fn diagonal_of_unit_cube() {
        let b = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert!((b.diagonal() - 3f32.sqrt()).abs() < 1e-6);
        assert_eq!(b.center(), Vec3::splat(0.5));
    }

    #[test]
    fn transformed_by_translation_and_scale() {
        let b = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let t = b.transformed(&m);
        assert_eq!(t.min, Vec3::new(8.0, -2.0, -2.0));
        assert_eq!(t.max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[test]
    fn transformed_by_rotation_stays_axis_aligned() {
        let b = Aabb::from_min_max(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let t = b.transformed(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2));
        // x extent moves onto z.
        assert!((t.size().z - 2.0).abs() < 1e-5);
        assert!((t.size().x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_min_max(Vec3::splat(2.0), Vec3::splat(3.0));
        let u = a.union(b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(3.0));
    }
}
