//! SGGX microflake distribution.
//!
//! Based on "The SGGX Microflake Distribution" by Eric Heitz, Jonathan Dupuy,
//! Cyril Crassin and Carsten Dachsbacher (SIGGRAPH 2015).
//! The distribution is entirely described by a [`Covariance`]; none of the
//! functions below keep any state.

use cgmath::{InnerSpace, Zero};

use crate::{
    constants::INV_PI,
    covariance::Covariance,
    samplers::{Sampler, sample_uniform_disk_polar},
    vec::{Frame, Vec2, Vec3},
};

/// Projected area of the flakes seen from `d`: `sqrt(dᵗ·S·d)`.
///
/// The quadratic form is clamped to zero first: for directions almost
/// orthogonal to thin flakes rounding makes it slightly negative.
#[must_use]
pub fn sigma(d: &Vec3, s: &Covariance) -> f64 {
    let sigma_sqr = s.quadratic_form(d);
    if sigma_sqr > 0.0 { sigma_sqr.sqrt() } else { 0.0 }
}

/// Density of micro-normals, `|S|^1.5 / (π·(wmᵗ·adj(S)·wm)²)`.
///
/// `s` must not be degenerate: the denominator vanishes on the null set of
/// the adjugate form, where zero is returned.
#[must_use]
pub fn ndf(wm: &Vec3, s: &Covariance) -> f64 {
    let det = s.determinant();
    let den = s.adjugate_form(wm);
    if den == 0.0 {
        return 0.0;
    }
    det.abs().powf(1.5) * INV_PI / (den * den)
}

/// Sample a micro-normal proportionally to the visible normal distribution
/// `⟨wi, wm⟩·D(wm) / σ(wi)`.
///
/// The covariance is expressed in a basis `(wk, wj, wi)` built around `wi`,
/// where the distribution of visible normals is the image of a uniform
/// hemisphere by a lower triangular matrix `M = [Mk Mj Mi]`. Exactly two
/// uniform values are drawn from `sampler`.
///
/// Returns the zero vector when the projected basis is singular
/// (`σ(wi) = 0` or a flat projection), callers treat it as "no scattering".
#[must_use]
pub fn sample_visible_normal(wi: &Vec3, s: &Covariance, sampler: &mut dyn Sampler) -> Vec3 {
    let u1 = sampler.next();
    let u2 = sampler.next();
    let disk = sample_uniform_disk_polar(&Vec2::new(u1, u2));
    visible_normal_from_disk(wi, s, &disk)
}

/// Deterministic part of [`sample_visible_normal`] for a given point of the unit disk
#[must_use]
pub fn visible_normal_from_disk(wi: &Vec3, s: &Covariance, disk: &Vec2) -> Vec3 {
    let (u, v) = (disk.x, disk.y);
    let w = u.mul_add(-u, v.mul_add(-v, 1.0)).max(0.0).sqrt();

    let frame = Frame::new(wi);
    let (wk, wj) = (frame.s, frame.t);

    // project S in this basis
    let p = s.project(&wk, &wj, wi);
    let (s_kk, s_jj, s_ii) = (p.xx, p.yy, p.zz);
    let (s_kj, s_ki, s_ji) = (p.xy, p.xz, p.yz);

    if s_ii <= 0.0 {
        return Vec3::zero();
    }
    let tmp = s_jj.mul_add(s_ii, -s_ji * s_ji).max(0.0).sqrt();
    if tmp == 0.0 {
        return Vec3::zero();
    }

    let sqrt_det_skji = p.determinant().abs().sqrt();
    let inv_sqrt_sii = 1.0 / s_ii.sqrt();
    let m_k = Vec3::new(sqrt_det_skji / tmp, 0.0, 0.0);
    let m_j = Vec3::new(
        -inv_sqrt_sii * s_ki.mul_add(s_ji, -s_kj * s_ii) / tmp,
        inv_sqrt_sii * tmp,
        0.0,
    );
    let m_i = Vec3::new(inv_sqrt_sii * s_ki, inv_sqrt_sii * s_ji, inv_sqrt_sii * s_ii);

    let wm_kji = m_k * u + m_j * v + m_i * w;
    if wm_kji.magnitude2() == 0.0 {
        return Vec3::zero();
    }
    frame.to_world(&wm_kji.normalize()).normalize()
}

/// Visible normal density `max(0, wi·wm)·D(wm) / σ(wi)`, the pdf of [`sample_visible_normal`]
#[must_use]
pub fn pdf_visible_normal(wi: &Vec3, wm: &Vec3, s: &Covariance) -> f64 {
    let sigma_wi = sigma(wi, s);
    if sigma_wi == 0.0 {
        return 0.0;
    }
    wi.dot(*wm).max(0.0) * ndf(wm, s) / sigma_wi
}
