use std::fmt::Write;

use cgmath::{InnerSpace, Zero};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;

use crate::{
    array2d::Array2d,
    constants::M_PI,
    samplers::Sampler,
    vec::{Color3, Vec2, Vec2u, Vec3, is_finite},
};

#[must_use]
pub fn spherical_coordinates_to_direction(phi: f64, theta: f64) -> Vec3 {
    let cos_theta = theta.cos();
    let sin_theta = theta.sin();
    let cos_phi = phi.cos();
    let sin_phi = phi.sin();
    Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}

#[must_use]
pub fn direction_to_spherical_coordinates(v: Vec3) -> (f64, f64) {
    (-v.y.atan2(-v.x) + M_PI, v.z.clamp(-1.0, 1.0).acos())
}

/// Azimuth in `[0, 2π)` of a direction expressed in a local frame
#[must_use]
pub fn azimuth(v: &Vec3) -> f64 {
    let phi = v.y.atan2(v.x);
    if phi < 0.0 { phi + 2.0 * M_PI } else { phi }
}

/// Pearson statistic of `counts` against a uniform distribution over the bins
#[must_use]
pub fn chi_square_uniform(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if counts.is_empty() || total == 0 {
        return 0.0;
    }
    let expected = total as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

fn pixel_to_direction(p: Vec2, image_size: Vec2u) -> Vec3 {
    spherical_coordinates_to_direction(
        p.x * 2.0 * M_PI / f64::from(image_size.x),
        p.y * M_PI / f64::from(image_size.y),
    )
}

fn direction_to_pixel(d: Vec3, image_size: Vec2u) -> Vec2u {
    let sc = direction_to_spherical_coordinates(d);
    Vec2u::new(
        (sc.0 * f64::from(image_size.x) / (2.0 * M_PI)) as u32,
        (sc.1 * f64::from(image_size.y) / M_PI) as u32,
    )
}

// Based on https://www.shadertoy.com/view/WlfXRN
// Give a color (viridis) based on float value
#[allow(clippy::unreadable_literal)]
fn color(t: f64) -> Color3 {
    let c0 = Color3::new(0.2777273272234177, 0.005407344544966578, 0.3340998053353061);
    let c1 = Color3::new(0.1050930431085774, 1.404613529898575, 1.384590162594685);
    let c2 = Color3::new(-0.3308618287255563, 0.214847559468213, 0.09509516302823659);
    let c3 = Color3::new(-4.634230498983486, -5.799100973351585, -19.33244095627987);
    let c4 = Color3::new(6.228269936347081, 14.17993336680509, 56.69055260068105);
    let c5 = Color3::new(4.776384997670288, -13.74514537774601, -65.35303263337234);
    let c6 = Color3::new(-5.435455855934631, 4.645852612178535, 26.3124352495832);

    c0 + t * (c1 + t * (c2 + t * (c3 + t * (c4 + t * (c5 + t * c6)))))
}

/// Density of the outgoing direction; may consume randomness (one sample estimates)
pub type PdfFunction<'a> = dyn Fn(&Vec3, &mut dyn Sampler) -> f64 + Sync + 'a;
/// Draws an outgoing direction, `None` when the weight is zero
pub type SampleFunction<'a> = dyn Fn(&mut dyn Sampler) -> Option<Vec3> + Sync + 'a;

/// Summary of a pdf/histogram comparison
#[derive(Debug, Clone, Copy)]
pub struct HistogramStats {
    /// Integral of the pdf over the sphere (should be close to 1)
    pub integral: f64,
    /// Mean difference between the pdf and the histogram (should be close to 0)
    pub difference: f64,
    pub nan_or_inf: bool,
}

fn progress_bar(len: u64) -> ProgressBar {
    let progress = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar}] {pos:>7}/{len:7} ({eta})",
    ) {
        progress.set_style(
            style
                .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                })
                .progress_chars("#>-"),
        );
    }
    progress
}

/// Compares a directional pdf with the histogram of sampled directions over
/// a latitude/longitude image. Rows are processed in parallel, each one with
/// its own clone of `sampler`.
///
/// Returns the pdf, histogram and difference images with the statistics.
pub fn generate_histogram(
    pdf_f: &PdfFunction<'_>,
    sample_f: &SampleFunction<'_>,
    nb_samples: u32,
    image_size: Vec2u,
    sampler: &mut dyn Sampler,
) -> (
    Array2d<Color3>,
    Array2d<Color3>,
    Array2d<Color3>,
    HistogramStats,
) {
    let nb_samples = nb_samples.max(1);
    let progress = progress_bar(u64::from(image_size.y) * 2);

    // Compute PDF values
    let row_samplers = (0..image_size.y)
        .map(|_| sampler.clone_box())
        .collect::<Vec<_>>();
    let pdf_rows = row_samplers
        .into_par_iter()
        .enumerate()
        .map(|(y, mut row_sampler)| {
            let y = y as u32;
            let mut row = vec![0.0; image_size.x as usize];
            let mut integral = 0.0;
            let mut nan_or_inf = false;
            for x in 0..image_size.x {
                let mut acc = 0.0;
                for _ in 0..nb_samples {
                    let pos_img = Vec2::new(f64::from(x), f64::from(y)) + row_sampler.next2d();
                    let dir = pixel_to_direction(pos_img, image_size);
                    let sin_theta = dir.z.mul_add(-dir.z, 1.0).max(0.0).sqrt();
                    let pixel_area = (M_PI / f64::from(image_size.y))
                        * (M_PI * 2.0 / f64::from(image_size.x))
                        * sin_theta;
                    let pdf_val = pdf_f(&dir, row_sampler.as_mut());
                    if !pdf_val.is_finite() {
                        if !nan_or_inf {
                            warn!("PDF is NaN or Inf at ({x}, {y}) -- dir: {dir:?}");
                        }
                        nan_or_inf = true;
                        continue;
                    }
                    acc += pdf_val;
                    integral += pdf_val * pixel_area;
                }
                row[x as usize] = acc / f64::from(nb_samples);
            }
            progress.inc(1);
            (row, integral, nan_or_inf)
        })
        .collect::<Vec<_>>();

    let mut pdf = Array2d::with_size(image_size.x, image_size.y, 0.0);
    let mut integral = 0.0;
    let mut nan_or_inf = false;
    for (y, (row, row_integral, row_nan)) in pdf_rows.into_iter().enumerate() {
        for (x, v) in row.into_iter().enumerate() {
            *pdf.at_mut(x as u32, y as u32) = v;
        }
        integral += row_integral;
        nan_or_inf |= row_nan;
    }
    integral /= f64::from(nb_samples);

    // Compute sample histogram
    let normalisation = 1.0 / (M_PI * (2.0 * M_PI) * f64::from(nb_samples));
    let row_samplers = (0..image_size.y)
        .map(|_| sampler.clone_box())
        .collect::<Vec<_>>();
    let hist_rows = row_samplers
        .into_par_iter()
        .map(|mut row_sampler| {
            let row_samples = u64::from(image_size.x) * u64::from(nb_samples);
            let mut pixels = Vec::with_capacity(row_samples as usize);
            let mut nan_or_inf = false;
            for _ in 0..row_samples {
                let Some(dir) = sample_f(row_sampler.as_mut()) else {
                    continue;
                };
                if !is_finite(&dir) {
                    if !nan_or_inf {
                        warn!("Invalid sampled direction: {dir:?}");
                    }
                    nan_or_inf = true;
                    continue;
                }
                if dir.is_zero() {
                    continue;
                }

                let dir = dir.normalize();
                let pixel = direction_to_pixel(dir, image_size);
                if pixel.x >= image_size.x || pixel.y >= image_size.y {
                    continue;
                }
                let sin_theta = dir.z.mul_add(-dir.z, 1.0).max(0.0).sqrt();
                pixels.push((pixel, normalisation / sin_theta));
            }
            progress.inc(1);
            (pixels, nan_or_inf)
        })
        .collect::<Vec<_>>();

    let mut histogram = Array2d::with_size(image_size.x, image_size.y, 0.0);
    for (pixels, row_nan) in hist_rows {
        for (pixel, weight) in pixels {
            *histogram.at_mut(pixel.x, pixel.y) += weight;
        }
        nan_or_inf |= row_nan;
    }
    progress.finish_and_clear();

    // Compute exposure with 99.95% percentile
    let mut pdf_1d = pdf.data().to_vec();
    pdf_1d.sort_by(f64::total_cmp);
    let percentile = ((pdf_1d.len() as f64 * 0.9995) as usize).min(pdf_1d.len().saturating_sub(1));
    let exposure = pdf_1d
        .get(percentile)
        .copied()
        .filter(|&e| e != 0.0)
        .unwrap_or(1.0);

    if nan_or_inf {
        error!("Some directions or pdf values are invalid (NaN or Inf).");
    }

    // Compute final image
    let mut histogram_image = Array2d::with_size(image_size.x, image_size.y, Color3::zero());
    let mut pdf_image = Array2d::with_size(image_size.x, image_size.y, Color3::zero());
    let mut diff_image = Array2d::with_size(image_size.x, image_size.y, Color3::zero());
    let mut difference = 0.0;
    for y in 0..image_size.y {
        for x in 0..image_size.x {
            let pdf_val = *pdf.at(x, y);
            let histogram_val = *histogram.at(x, y);
            let diff = pdf_val - histogram_val;
            difference += diff;

            let diff_color = if diff < 0.0 {
                Color3::new(-diff / exposure, 0.0, 0.0)
            } else {
                Color3::new(0.0, diff / exposure, 0.0)
            };

            *pdf_image.at_mut(x, y) = color(pdf_val / exposure);
            *histogram_image.at_mut(x, y) = color(histogram_val / exposure);
            *diff_image.at_mut(x, y) = diff_color;
        }
    }
    let nb_pixels = f64::from(image_size.x) * f64::from(image_size.y);
    if nb_pixels > 0.0 {
        difference /= nb_pixels;
    }

    info!("Integral of the pdf (should be close to 1): {integral}");
    info!("99.95% percentile of the pdf: {exposure}");
    info!("Mean difference between histogram and pdf (should be close to 0): {difference}");

    (
        pdf_image,
        histogram_image,
        diff_image,
        HistogramStats {
            integral,
            difference,
            nan_or_inf,
        },
    )
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, assert_abs_diff_eq};

    use super::{
        azimuth, chi_square_uniform, direction_to_spherical_coordinates, generate_histogram,
        spherical_coordinates_to_direction,
    };
    use crate::{
        constants::M_PI,
        samplers::{Sampler, independent::Independent, pdf_spherical, sample_spherical},
        vec::{Vec2u, Vec3},
    };

    #[test]
    fn spherical_round_trip() {
        let d = Vec3::new(0.3, -0.5, 0.8).normalize();
        let (phi, theta) = direction_to_spherical_coordinates(d);
        assert_abs_diff_eq!(spherical_coordinates_to_direction(phi, theta), d, epsilon = 1e-12);
    }

    #[test]
    fn azimuth_range() {
        assert_abs_diff_eq!(azimuth(&Vec3::unit_x()), 0.0);
        assert_abs_diff_eq!(azimuth(&Vec3::unit_y()), M_PI / 2.0);
        assert_abs_diff_eq!(azimuth(&-Vec3::unit_y()), 1.5 * M_PI);
    }

    #[test]
    fn chi_square() {
        assert_abs_diff_eq!(chi_square_uniform(&[10, 10, 10, 10]), 0.0);
        // expected 10 per bin: (10² + 10²) / 10
        assert_abs_diff_eq!(chi_square_uniform(&[20, 0, 10, 10]), 20.0);
        assert_abs_diff_eq!(chi_square_uniform(&[]), 0.0);
    }

    #[test]
    fn histogram_of_empty_image() {
        let mut sampler = Independent::new(51);
        let pdf = |d: &Vec3, _: &mut dyn Sampler| pdf_spherical(d);
        let sample = |s: &mut dyn Sampler| Some(sample_spherical(&s.next2d()));
        for size in [Vec2u::new(0, 0), Vec2u::new(0, 8), Vec2u::new(8, 0)] {
            let (pdf_image, _, _, stats) = generate_histogram(&pdf, &sample, 4, size, &mut sampler);
            assert_eq!(pdf_image.data().len(), 0);
            assert_eq!((stats.integral, stats.difference), (0.0, 0.0));
        }

        // no samples per pixel still yields finite statistics
        let (_, _, _, stats) = generate_histogram(&pdf, &sample, 0, Vec2u::new(8, 4), &mut sampler);
        assert!(stats.integral.is_finite() && stats.difference.is_finite());
    }

    #[test]
    fn histogram_of_uniform_sphere() {
        let mut sampler = Independent::new(50);
        let pdf = |d: &Vec3, _: &mut dyn Sampler| pdf_spherical(d);
        let sample = |s: &mut dyn Sampler| Some(sample_spherical(&s.next2d()));
        let (_, _, _, stats) =
            generate_histogram(&pdf, &sample, 16, Vec2u::new(32, 16), &mut sampler);
        assert!(!stats.nan_or_inf);
        assert_abs_diff_eq!(stats.integral, 1.0, epsilon = 0.02);
        assert_abs_diff_eq!(stats.difference, 0.0, epsilon = 0.01);
    }
}
