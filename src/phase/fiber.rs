use libm::erf;
use log::debug;

use crate::{
    constants::{INV_TWOPI, M_PI},
    covariance::Covariance,
};

const TABLE_SIZE: usize = 256;
const INTEGRATION_STEPS: usize = 2048;
/// Beyond this many standard deviations the lobe is below 1e-21 of its peak
const LOBE_EXTENT: f64 = 10.0;

/// Orientation distribution of fiber-like flakes whose axis is `z`.
///
/// Normals are concentrated around the plane orthogonal to the fiber:
/// `D(m) ∝ exp(-cos²θ / (2σ²))` with `θ` the angle between `m` and the axis.
/// The projected area `sigma_t` only depends on the angle to the axis and is
/// tabulated once at construction.
#[derive(Debug, Clone)]
pub struct FiberDistribution {
    stddev: f64,
    normalization: f64,
    sigma_t: Vec<f64>,
}

impl FiberDistribution {
    pub fn new(stddev: f64) -> crate::Result<Self> {
        if !(stddev > 0.0 && stddev.is_finite()) {
            return Err(crate::Error::InvalidParameter("stddev", stddev));
        }

        let lobe = |x: f64| (-x * x / (2.0 * stddev * stddev)).exp();
        // ∫₋₁¹ exp(-x²/2σ²) dx = σ·√(2π)·erf(1/(σ√2))
        let lobe_integral =
            stddev * (2.0 * M_PI).sqrt() * erf(1.0 / (stddev * std::f64::consts::SQRT_2));
        let normalization = INV_TWOPI / lobe_integral;

        // integration grid scales with the width of the lobe
        let bound = (LOBE_EXTENT * stddev).min(1.0);
        let sigma_t = (0..TABLE_SIZE)
            .map(|i| {
                let cos_i = i as f64 / (TABLE_SIZE - 1) as f64;
                let sin_i = cos_i.mul_add(-cos_i, 1.0).max(0.0).sqrt();
                let integrand = |x: f64| {
                    let sin_m = x.mul_add(-x, 1.0).max(0.0).sqrt();
                    lobe(x) * azimuthal_abs_cos(sin_i * sin_m, cos_i * x)
                };
                normalization * simpson(integrand, -bound, bound, INTEGRATION_STEPS)
            })
            .collect::<Vec<_>>();

        debug!(
            "Tabulated fiber projected area (stddev: {stddev}, sigma_t(0): {}, sigma_t(1): {})",
            sigma_t[0],
            sigma_t[TABLE_SIZE - 1]
        );

        Ok(Self {
            stddev,
            normalization,
            sigma_t,
        })
    }

    #[must_use]
    pub const fn stddev(&self) -> f64 {
        self.stddev
    }

    /// Density per unit solid angle of a normal making `cos_theta` with the axis
    #[must_use]
    pub fn pdf_cos_theta(&self, cos_theta: f64) -> f64 {
        self.normalization * (-cos_theta * cos_theta / (2.0 * self.stddev * self.stddev)).exp()
    }

    /// Expected projected area `∫|ω·m| D(m) dm` seen from a direction making
    /// `cos_theta` with the fiber axis. Equals 1/2 for an isotropic distribution.
    #[must_use]
    pub fn sigma_t(&self, cos_theta: f64) -> f64 {
        let x = cos_theta.abs().min(1.0) * (TABLE_SIZE - 1) as f64;
        let i = (x as usize).min(TABLE_SIZE - 2);
        let t = x - i as f64;
        self.sigma_t[i].mul_add(1.0 - t, self.sigma_t[i + 1] * t)
    }

    /// Diagonal SGGX covariance reproducing the projected area across and along the fiber
    #[must_use]
    pub fn covariance(&self) -> Covariance {
        let sigma1 = self.sigma_t(0.0) * 2.0;
        let sigma2 = sigma1;
        let sigma3 = self.sigma_t(1.0) * 2.0;
        Covariance::diagonal(sigma1 * sigma1, sigma2 * sigma2, sigma3 * sigma3)
    }
}

/// `∫₀²ᵖⁱ |a·cos φ + b| dφ` for `a ≥ 0`
fn azimuthal_abs_cos(a: f64, b: f64) -> f64 {
    if a <= b.abs() {
        return 2.0 * M_PI * b.abs();
    }
    let phi0 = (-b / a).acos();
    let sin_phi0 = (1.0 - (b / a) * (b / a)).max(0.0).sqrt();
    (4.0 * a).mul_add(sin_phi0, 2.0 * b * 2.0f64.mul_add(phi0, -M_PI))
}

fn simpson<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, steps: usize) -> f64 {
    let steps = steps + steps % 2;
    let h = (b - a) / steps as f64;
    let mut acc = f(a) + f(b);
    for i in 1..steps {
        let w = if i % 2 == 1 { 4.0 } else { 2.0 };
        acc += w * f((i as f64).mul_add(h, a));
    }
    acc * h / 3.0
}

#[cfg(test)]
mod tests {
    use cgmath::assert_abs_diff_eq;

    use super::{FiberDistribution, azimuthal_abs_cos, simpson};
    use crate::constants::{INV_PI, M_PI};

    #[test]
    fn azimuthal_integral() {
        assert_abs_diff_eq!(azimuthal_abs_cos(1.0, 0.0), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(azimuthal_abs_cos(0.0, -0.5), M_PI, epsilon = 1e-12);
        let brute = simpson(|phi| (0.7 * phi.cos() + 0.3).abs(), 0.0, 2.0 * M_PI, 20_000);
        assert_abs_diff_eq!(azimuthal_abs_cos(0.7, 0.3), brute, epsilon = 1e-4);
    }

    #[test]
    fn normalized_over_sphere() {
        for stddev in [0.2, 0.01, 1e-3, 5e-4, 1e-4] {
            let fiber = FiberDistribution::new(stddev).unwrap();
            let bound = (12.0 * stddev).min(1.0);
            let integral =
                2.0 * M_PI * simpson(|x| fiber.pdf_cos_theta(x), -bound, bound, 4096);
            assert_abs_diff_eq!(integral, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn wide_distribution_is_isotropic() {
        let fiber = FiberDistribution::new(100.0).unwrap();
        for cos_theta in [0.0, 0.3, 0.5, 0.9, 1.0] {
            assert_abs_diff_eq!(fiber.sigma_t(cos_theta), 0.5, epsilon = 1e-3);
        }
    }

    #[test]
    fn narrow_distribution_is_fiber_like() {
        let fiber = FiberDistribution::new(0.02).unwrap();
        // seen across the fiber every normal lies in the viewing plane
        assert_abs_diff_eq!(fiber.sigma_t(0.0), 2.0 * INV_PI, epsilon = 5e-3);
        // seen along the fiber almost no area is visible
        assert!(fiber.sigma_t(1.0) < 0.05);
        assert!(fiber.sigma_t(0.5) < fiber.sigma_t(0.0));
        assert_abs_diff_eq!(fiber.sigma_t(-0.5), fiber.sigma_t(0.5));

        // along the axis the visible area tends to σ·√(2/π)
        for stddev in [1e-3, 5e-4, 1e-4] {
            let fiber = FiberDistribution::new(stddev).unwrap();
            let along = stddev * (2.0 * INV_PI).sqrt();
            assert_abs_diff_eq!(fiber.sigma_t(1.0), along, epsilon = 1e-3 * along);
            assert_abs_diff_eq!(fiber.sigma_t(0.0), 2.0 * INV_PI, epsilon = 1e-4);
        }
    }

    #[test]
    fn covariance_is_diagonal() {
        let fiber = FiberDistribution::new(0.1).unwrap();
        let s = fiber.covariance();
        assert_eq!(s.xx, s.yy);
        assert!(s.zz < s.xx);
        assert_eq!((s.xy, s.xz, s.yz), (0.0, 0.0, 0.0));
    }

    #[test]
    fn invalid_stddev() {
        assert!(FiberDistribution::new(0.0).is_err());
        assert!(FiberDistribution::new(-1.0).is_err());
        assert!(FiberDistribution::new(f64::NAN).is_err());
    }
}
