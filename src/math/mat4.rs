// math/mat4.rs — affine transforms between object-local and world space

use super::Vec3;

/// Row-major 4×4 matrix. Only affine matrices (last row `0 0 0 1`) are
/// produced by the constructors here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub m: [[f64; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(t: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][3] = t.x;
        out.m[1][3] = t.y;
        out.m[2][3] = t.z;
        out
    }

    pub fn scale(s: Vec3) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][0] = s.x;
        out.m[1][1] = s.y;
        out.m[2][2] = s.z;
        out
    }

    /// Rotation of `angle` radians about the Y axis.
    pub fn y_rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Self::IDENTITY;
        out.m[0][0] = c;
        out.m[0][2] = s;
        out.m[2][0] = -s;
        out.m[2][2] = c;
        out
    }

    /// `self * other`: applying the result is applying `other` first.
    pub fn times(&self, other: &Mat4) -> Mat4 {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Mat4 { m }
    }

    #[inline]
    pub fn transform(&self, p: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
        )
    }

    /// Transform a direction (ignores translation).
    #[inline]
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        let m = &self.m;
        Vec3::new(
            m[0][0] * d.x + m[0][1] * d.y + m[0][2] * d.z,
            m[1][0] * d.x + m[1][1] * d.y + m[1][2] * d.z,
            m[2][0] * d.x + m[2][1] * d.y + m[2][2] * d.z,
        )
    }

    /// Translation component.
    #[inline]
    pub fn translation_part(&self) -> Vec3 {
        Vec3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    /// Inverse of an affine matrix, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Mat4> {
        let a = &self.m;
        let c00 = a[1][1] * a[2][2] - a[1][2] * a[2][1];
        let c01 = a[1][2] * a[2][0] - a[1][0] * a[2][2];
        let c02 = a[1][0] * a[2][1] - a[1][1] * a[2][0];
        let det = a[0][0] * c00 + a[0][1] * c01 + a[0][2] * c02;
        if det.abs() < 1e-300 {
            return None;
        }
        let inv_det = 1.0 / det;
        let mut m = Self::IDENTITY.m;
        m[0][0] = c00 * inv_det;
        m[0][1] = (a[0][2] * a[2][1] - a[0][1] * a[2][2]) * inv_det;
        m[0][2] = (a[0][1] * a[1][2] - a[0][2] * a[1][1]) * inv_det;
        m[1][0] = c01 * inv_det;
        m[1][1] = (a[0][0] * a[2][2] - a[0][2] * a[2][0]) * inv_det;
        m[1][2] = (a[0][2] * a[1][0] - a[0][0] * a[1][2]) * inv_det;
        m[2][0] = c02 * inv_det;
        m[2][1] = (a[0][1] * a[2][0] - a[0][0] * a[2][1]) * inv_det;
        m[2][2] = (a[0][0] * a[1][1] - a[0][1] * a[1][0]) * inv_det;
        let t = Vec3::new(a[0][3], a[1][3], a[2][3]);
        for row in m.iter_mut().take(3) {
            row[3] = -(row[0] * t.x + row[1] * t.y + row[2] * t.z);
        }
        Some(Mat4 { m })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_undoes_translation_and_scale() {
        let m = Mat4::translation(Vec3::new(1.0, -2.0, 3.0)).times(&Mat4::scale(Vec3::new(2.0, 4.0, 0.5)));
        let inv = m.inverse().unwrap();
        let p = Vec3::new(0.3, 0.7, -1.1);
        let back = inv.transform(m.transform(p));
        assert!((back - p).length() < 1e-12);
    }

    #[test]
    fn direction_ignores_translation() {
        let m = Mat4::translation(Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(m.transform_direction(Vec3::X), Vec3::X);
    }

    #[test]
    fn singular_has_no_inverse() {
        assert!(Mat4::scale(Vec3::new(1.0, 0.0, 1.0)).inverse().is_none());
    }
}
