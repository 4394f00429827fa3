use std::{collections::HashMap, f64};

use log::info;
use tinyjson::JsonValue;

use crate::{
    constants::{FRAC_PI_2, FRAC_PI_4},
    json::{json_to_f64, json_to_string},
    vec::{Vec2, Vec3, spherical_to_directional},
};

/// Source of independent uniform values in `[0, 1)`.
///
/// Owned by the caller and handed to every scattering operation that needs randomness.
pub trait Sampler: Send + Sync {
    fn next(&mut self) -> f64;
    fn next2d(&mut self) -> Vec2;
    fn clone_box(&mut self) -> Box<dyn Sampler>;
}

pub mod independent;

pub fn json_to_sampler(json: &HashMap<String, JsonValue>) -> crate::Result<Box<dyn Sampler>> {
    if !json.contains_key("type") {
        return Err(crate::Error::AttribNotFound(
            "type".to_string(),
            "sampler".to_string(),
        ));
    }

    let t = json_to_string(json, "type", "");
    let seed = json_to_f64(json, "seed", 0.0) as u64;
    match t.as_str() {
        "independent" => {
            info!("Creating independent sampler (seed: {seed})");
            Ok(Box::new(independent::Independent::new(seed)))
        }
        _ => Err(crate::Error::InvalidType(t)),
    }
}

/// Uniform point on the unit disk using the polar mapping (`r = sqrt(u)`)
#[must_use]
pub fn sample_uniform_disk_polar(sample: &Vec2) -> Vec2 {
    let r = sample.x.sqrt();
    let phi = 2.0 * f64::consts::PI * sample.y;
    Vec2::new(r * phi.cos(), r * phi.sin())
}

/// Uniform point on the unit disk using Shirley's concentric mapping
#[must_use]
pub fn sample_concentric_disk(sample: &Vec2) -> Vec2 {
    let r1 = 2.0f64.mul_add(sample.x, -1.0);
    let r2 = 2.0f64.mul_add(sample.y, -1.0);

    // Handle degeneracy at the origin.
    if r1 == 0.0 && r2 == 0.0 {
        return Vec2::new(0.0, 0.0);
    }

    let (r, phi) = if r1 * r1 > r2 * r2 {
        (r1, FRAC_PI_4 * (r2 / r1))
    } else {
        (r2, FRAC_PI_2 - (r1 / r2) * FRAC_PI_4)
    };
    Vec2::new(r * phi.cos(), r * phi.sin())
}

/// Lift a point of the unit disk onto the upper unit hemisphere
#[must_use]
pub fn disk_to_hemisphere(p: &Vec2) -> Vec3 {
    let z = p.x.mul_add(-p.x, p.y.mul_add(-p.y, 1.0)).max(0.0).sqrt();
    Vec3::new(p.x, p.y, z)
}

#[must_use]
pub fn sample_cosine_hemisphere(sample: &Vec2) -> Vec3 {
    disk_to_hemisphere(&sample_concentric_disk(sample))
}

#[must_use]
pub fn pdf_cosine_hemisphere(dir: &Vec3) -> f64 {
    if dir.z < 0.0 {
        0.0
    } else {
        dir.z * f64::consts::FRAC_1_PI
    }
}

#[must_use]
pub fn sample_spherical(sample: &Vec2) -> Vec3 {
    let theta = sample.x.mul_add(2.0, -1.0).acos();
    let phi = sample.y * f64::consts::PI * 2.0;
    spherical_to_directional(theta, phi)
}

#[must_use]
pub fn pdf_spherical(_dir: &Vec3) -> f64 {
    crate::constants::INV_FOURPI
}
