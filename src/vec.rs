use crate::Real;
use cgmath::{self, InnerSpace};

// 2D
pub type Vec2 = cgmath::Vector2<Real>;
pub type Vec2u = cgmath::Vector2<u32>;

// 3D and color
pub type Vec3 = cgmath::Vector3<Real>;
pub type Point3 = cgmath::Point3<Real>;
pub type Color3 = cgmath::Vector3<Real>;

// Matrices
pub type Mat3 = cgmath::Matrix3<Real>;

/// Convert from linear RGB to sRGB
#[must_use]
pub fn to_srgb(c: &Color3) -> Color3 {
    let mut result = Color3::new(0.0, 0.0, 0.0);

    for i in 0..3 {
        let value = c[i];
        if value <= 0.003_130_8 {
            result[i] = 12.92 * value;
        } else {
            result[i] = value.powf(1.0 / 2.4).mul_add(1.0 + 0.055, -0.055);
        }
    }

    result
}

/// Check if the vector contains a NaN/Inf value
#[must_use]
pub fn is_finite(v: &Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

/// Construct a frame using only one vector
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub s: Vec3,
    pub t: Vec3,
    pub n: Vec3,
}

impl Frame {
    #[must_use]
    #[allow(clippy::suboptimal_flops)]
    pub fn new(n: &Vec3) -> Self {
        // Based on "Building an Orthonormal Basis, Revisited" by
        // Tom Duff, James Burgess, Per Christensen, Christophe Hery, Andrew Kensler,
        // Max Liani, and Ryusuke Villemin
        // https://graphics.pixar.com/library/OrthonormalB/paper.pdf
        let sign = if n.z < 0.0 { -1.0 } else { 1.0 };
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let s = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
        let t = Vec3::new(b, sign + n.y * n.y * a, -n.y);

        Self { s, t, n: *n }
    }

    #[must_use]
    pub fn to_world(&self, v: &Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    #[must_use]
    pub fn to_local(&self, v: &Vec3) -> Vec3 {
        Vec3::new(
            cgmath::dot(*v, self.s),
            cgmath::dot(*v, self.t),
            cgmath::dot(*v, self.n),
        )
    }
}

#[must_use]
pub fn spherical_to_directional(theta: f64, phi: f64) -> Vec3 {
    Vec3::new(
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    )
}

/// Mirror `v` about `n`, both pointing away from the surface
#[must_use]
pub fn reflect(v: &Vec3, n: &Vec3) -> Vec3 {
    let n = n.normalize();
    2.0 * v.dot(n) * n - v
}
