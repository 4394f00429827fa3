use serde::{Deserialize, Serialize};

use crate::{
    constants::DEGENERATE_SQR_SUM,
    vec::{Mat3, Vec3},
};

/// Symmetric second moment of the microflake orientations (SGGX matrix).
///
/// Supplied per shading point by the medium and passed around by value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Covariance {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl Covariance {
    #[must_use]
    pub const fn new(xx: f64, yy: f64, zz: f64, xy: f64, xz: f64, yz: f64) -> Self {
        Self {
            xx,
            yy,
            zz,
            xy,
            xz,
            yz,
        }
    }

    #[must_use]
    pub const fn diagonal(xx: f64, yy: f64, zz: f64) -> Self {
        Self::new(xx, yy, zz, 0.0, 0.0, 0.0)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self::diagonal(0.0, 0.0, 0.0)
    }

    /// Covariance of flakes whose normals are concentrated around `n` with
    /// the given `roughness` (1 gives spherical flakes).
    #[must_use]
    pub fn from_surface(n: &Vec3, roughness: f64) -> Self {
        let frame = crate::vec::Frame::new(n);
        let a2 = roughness * roughness;
        Self::from_basis(&frame.s, &frame.t, &frame.n, a2, a2, 1.0)
    }

    /// Build `S = e1 * e1ᵗ * l1 + e2 * e2ᵗ * l2 + e3 * e3ᵗ * l3` from an eigen-decomposition
    #[must_use]
    pub fn from_basis(e1: &Vec3, e2: &Vec3, e3: &Vec3, l1: f64, l2: f64, l3: f64) -> Self {
        let term = |a: usize, b: usize| l1 * e1[a] * e1[b] + l2 * e2[a] * e2[b] + l3 * e3[a] * e3[b];
        Self::new(
            term(0, 0),
            term(1, 1),
            term(2, 2),
            term(0, 1),
            term(0, 2),
            term(1, 2),
        )
    }

    #[must_use]
    pub fn sqr_sum(&self) -> f64 {
        self.xx * self.xx
            + self.yy * self.yy
            + self.zz * self.zz
            + self.xy * self.xy
            + self.xz * self.xz
            + self.yz * self.yz
    }

    /// No flake orientation is defined, every scattering quantity is zero
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.sqr_sum().abs() < DEGENERATE_SQR_SUM
    }

    /// `dᵗ·S·d`
    #[must_use]
    pub fn quadratic_form(&self, d: &Vec3) -> f64 {
        self.bilinear_form(d, d)
    }

    /// `aᵗ·S·b`
    #[must_use]
    pub fn bilinear_form(&self, a: &Vec3, b: &Vec3) -> f64 {
        a.x * b.x * self.xx
            + a.y * b.y * self.yy
            + a.z * b.z * self.zz
            + a.x.mul_add(b.y, a.y * b.x) * self.xy
            + a.x.mul_add(b.z, a.z * b.x) * self.xz
            + a.y.mul_add(b.z, a.z * b.y) * self.yz
    }

    #[must_use]
    pub fn determinant(&self) -> f64 {
        let Self {
            xx,
            yy,
            zz,
            xy,
            xz,
            yz,
        } = *self;
        xx * yy * zz - xx * yz * yz - yy * xz * xz - zz * xy * xy + 2.0 * xy * xz * yz
    }

    /// `wᵗ·adj(S)·w`, equal to `det(S)·wᵗ·S⁻¹·w` when `S` is invertible
    #[must_use]
    pub fn adjugate_form(&self, w: &Vec3) -> f64 {
        let Self {
            xx,
            yy,
            zz,
            xy,
            xz,
            yz,
        } = *self;
        w.x * w.x * yy.mul_add(zz, -yz * yz)
            + w.y * w.y * xx.mul_add(zz, -xz * xz)
            + w.z * w.z * xx.mul_add(yy, -xy * xy)
            + 2.0
                * (w.x * w.y * xz.mul_add(yz, -zz * xy)
                    + w.x * w.z * xy.mul_add(yz, -yy * xz)
                    + w.y * w.z * xy.mul_add(xz, -xx * yz))
    }

    /// Express the tensor in the orthonormal basis `(e1, e2, e3)`
    #[must_use]
    pub fn project(&self, e1: &Vec3, e2: &Vec3, e3: &Vec3) -> Self {
        Self::new(
            self.quadratic_form(e1),
            self.quadratic_form(e2),
            self.quadratic_form(e3),
            self.bilinear_form(e1, e2),
            self.bilinear_form(e1, e3),
            self.bilinear_form(e2, e3),
        )
    }

    #[must_use]
    pub fn to_matrix(&self) -> Mat3 {
        Mat3::new(
            self.xx, self.xy, self.xz, self.xy, self.yy, self.yz, self.xz, self.yz, self.zz,
        )
    }
}

impl From<[f64; 6]> for Covariance {
    fn from(v: [f64; 6]) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Matrix, SquareMatrix, assert_abs_diff_eq};

    use super::Covariance;
    use crate::vec::Vec3;

    fn generic() -> Covariance {
        Covariance::new(0.8, 0.5, 0.3, 0.1, -0.05, 0.12)
    }

    #[test]
    fn degenerate_threshold() {
        assert!(Covariance::zero().is_degenerate());
        assert!(Covariance::diagonal(1e-4, 1e-4, 1e-4).is_degenerate());
        assert!(!Covariance::diagonal(1e-3, 0.0, 0.0).is_degenerate());
        assert!(!generic().is_degenerate());
    }

    #[test]
    fn forms_match_matrix() {
        let s = generic();
        let m = s.to_matrix();
        let a = Vec3::new(0.3, -0.4, 0.2);
        let b = Vec3::new(-0.1, 0.9, 0.5);
        assert_abs_diff_eq!(s.bilinear_form(&a, &b), a.dot(m * b), epsilon = 1e-12);
        assert_abs_diff_eq!(s.determinant(), m.determinant(), epsilon = 1e-12);

        let adj = m.invert().unwrap() * m.determinant();
        assert_abs_diff_eq!(s.adjugate_form(&a), a.dot(adj * a), epsilon = 1e-12);
        assert_abs_diff_eq!(m, m.transpose());
    }

    #[test]
    fn projection_preserves_invariants() {
        let s = generic();
        let frame = crate::vec::Frame::new(&Vec3::new(0.2, 0.7, -0.3).normalize());
        let p = s.project(&frame.s, &frame.t, &frame.n);
        assert_abs_diff_eq!(p.determinant(), s.determinant(), epsilon = 1e-12);
        assert_abs_diff_eq!(p.xx + p.yy + p.zz, s.xx + s.yy + s.zz, epsilon = 1e-12);
    }

    #[test]
    fn surface_like_flakes() {
        let s = Covariance::from_surface(&Vec3::unit_z(), 0.1);
        assert_abs_diff_eq!(s.xx, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(s.yy, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(s.zz, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.xy, 0.0, epsilon = 1e-12);
    }
}
