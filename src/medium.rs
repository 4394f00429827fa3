use std::{collections::HashMap, sync::Arc};

use cgmath::{Array, ElementWise};
use log::{info, warn};
use tinyjson::JsonValue;

use crate::{
    covariance::Covariance,
    json::{json_to_covariance, json_to_f64, json_to_string, json_to_vec3},
    phase::{PhaseFunction, json_to_phase},
    samplers::Sampler,
    vec::{Color3, Point3, Vec3},
};

/// Participating medium made of oriented flakes.
///
/// Besides free-path sampling it is the per-point covariance provider of the
/// phase function.
pub trait Medium: Send + Sync {
    fn covariance(&self, p: &Point3) -> Covariance;
    /// Extinction for light travelling along `dir`
    fn sigma_t(&self, dir: &Vec3) -> Color3;
    fn transmittance(&self, distance: f64, dir: &Vec3) -> Color3;
    fn sample(&self, max_distance: f64, dir: &Vec3, sampler: &mut dyn Sampler) -> MediumSample;
    fn phase_function(&self) -> &dyn PhaseFunction;
}

#[derive(Debug, Clone, Copy)]
pub enum MediumSample {
    Scatter {
        t: f64,
        weight: Color3,
        tr: Color3,
        pdf: f64,
    },
    None {
        tr: Color3,
    },
}

/// Medium with constant density and flake orientation.
///
/// `sigma_a` and `sigma_s` are given per unit of projected area: the actual
/// coefficients along `dir` are scaled by `σ(dir)` of the flakes.
pub struct HomogeneousMicroflakeMedium {
    pub sigma_a: Vec3,
    pub sigma_s: Vec3,
    pub density: f64,
    pub covariance: Covariance,
    pub phase: Arc<dyn PhaseFunction>,
}

impl HomogeneousMicroflakeMedium {
    pub fn from_json(json: &HashMap<String, JsonValue>) -> crate::Result<Self> {
        let sigma_a = json_to_vec3(json, "sigma_a", Vec3::from_value(0.0));
        let sigma_s = json_to_vec3(json, "sigma_s", Vec3::from_value(1.0));
        let density = json_to_f64(json, "density", 1.0);
        if density < 0.0 {
            return Err(crate::Error::InvalidParameter("density", density));
        }

        if !json.contains_key("phase") {
            return Err(crate::Error::AttribNotFound(
                "phase".to_string(),
                "homogeneous medium".to_string(),
            ));
        }
        let phase_json: &HashMap<String, JsonValue> = json["phase"]
            .get()
            .ok_or_else(|| crate::Error::UncoveredCaseJson("phase", json["phase"].clone()))?;
        let phase = json_to_phase(phase_json)?;

        let covariance = match (json_to_covariance(json, "covariance")?, phase.fixed_covariance()) {
            (Some(covariance), Some(_)) => {
                warn!("Medium covariance overrides the fiber model of the phase function");
                covariance
            }
            (Some(covariance), None) | (None, Some(covariance)) => covariance,
            (None, None) => {
                return Err(crate::Error::AttribNotFound(
                    "covariance".to_string(),
                    "homogeneous medium".to_string(),
                ));
            }
        };

        info!(
            "Created homogeneous microflake medium (sigma_a: {sigma_a:?}, sigma_s: {sigma_s:?}, density: {density}, covariance: {covariance:?})"
        );
        Ok(Self {
            sigma_a,
            sigma_s,
            density,
            covariance,
            phase,
        })
    }

    fn projected_area(&self, dir: &Vec3) -> f64 {
        if self.phase.needs_directionally_varying_coefficients() {
            self.phase.projected_area(dir, &self.covariance)
        } else {
            1.0
        }
    }
}

impl Medium for HomogeneousMicroflakeMedium {
    fn covariance(&self, _p: &Point3) -> Covariance {
        self.covariance
    }

    fn sigma_t(&self, dir: &Vec3) -> Color3 {
        (self.sigma_a + self.sigma_s) * (self.density * self.projected_area(dir))
    }

    fn transmittance(&self, distance: f64, dir: &Vec3) -> Color3 {
        transmittance_from_sigma_t(self.sigma_t(dir), distance.max(0.0))
    }

    fn sample(&self, max_distance: f64, dir: &Vec3, sampler: &mut dyn Sampler) -> MediumSample {
        if max_distance <= 0.0 {
            return MediumSample::None {
                tr: Color3::from_value(1.0),
            };
        }

        let area = self.projected_area(dir);
        let sigma_t = self.sigma_t(dir);
        let sigma_s = self.sigma_s * (self.density * area);
        let channel = (sampler.next() * 3.0).floor().clamp(0.0, 2.0) as usize;
        let sigma_t_channel = sigma_t[channel];

        if sigma_t_channel <= 0.0 {
            return MediumSample::None {
                tr: transmittance_from_sigma_t(sigma_t, max_distance),
            };
        }

        let sampled_dist = -(1.0 - sampler.next()).ln() / sigma_t_channel;
        if sampled_dist < max_distance {
            let tr = transmittance_from_sigma_t(sigma_t, sampled_dist);
            let pdf = tr.mul_element_wise(sigma_t).sum() * (1.0 / 3.0);
            if pdf <= 0.0 {
                return MediumSample::None { tr };
            }
            let weight = tr.mul_element_wise(sigma_s / pdf);
            MediumSample::Scatter {
                t: sampled_dist,
                weight,
                tr,
                pdf,
            }
        } else {
            MediumSample::None {
                tr: transmittance_from_sigma_t(sigma_t, max_distance),
            }
        }
    }

    fn phase_function(&self) -> &dyn PhaseFunction {
        self.phase.as_ref()
    }
}

pub fn json_to_medium(json: &HashMap<String, JsonValue>) -> crate::Result<Arc<dyn Medium>> {
    if !json.contains_key("type") {
        return Err(crate::Error::AttribNotFound(
            "type".to_string(),
            "medium".to_string(),
        ));
    }

    let t = json_to_string(json, "type", "");
    match t.as_str() {
        "homogeneous" => Ok(Arc::new(HomogeneousMicroflakeMedium::from_json(json)?)),
        _ => Err(crate::Error::InvalidType(t)),
    }
}

/// `exp(-σt·d)` per channel. A channel without extinction stays fully
/// transparent, also for unbounded distances.
#[must_use]
pub fn transmittance_from_sigma_t(sigma_t: Vec3, distance: f64) -> Color3 {
    let channel = |sigma: f64| {
        if sigma == 0.0 {
            return 1.0;
        }
        let optical_depth = sigma * distance;
        if optical_depth.is_nan() {
            1.0
        } else {
            (-optical_depth).exp()
        }
    };
    Color3::new(channel(sigma_t.x), channel(sigma_t.y), channel(sigma_t.z))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use cgmath::{Array, EuclideanSpace, InnerSpace, assert_abs_diff_eq};
    use tinyjson::JsonValue;

    use super::{HomogeneousMicroflakeMedium, Medium, MediumSample, json_to_medium};
    use crate::{
        covariance::Covariance,
        phase::{LobeMode, MicroflakePhase, PhaseFunction, ScatterQuery},
        samplers::{Sampler, independent::Independent},
        vec::{Color3, Point3, Vec3},
    };

    fn parse_object(s: &str) -> HashMap<String, JsonValue> {
        let parsed: JsonValue = s.parse().unwrap();
        parsed.get::<HashMap<String, JsonValue>>().unwrap().clone()
    }

    fn flat_medium(covariance: Covariance) -> HomogeneousMicroflakeMedium {
        HomogeneousMicroflakeMedium {
            sigma_a: Vec3::from_value(0.0),
            sigma_s: Vec3::from_value(2.0),
            density: 1.0,
            covariance,
            phase: Arc::new(MicroflakePhase::new(LobeMode::Specular)),
        }
    }

    #[test]
    fn extinction_follows_projected_area() {
        // flakes facing z: dense seen from z, thin seen from the side
        let medium = flat_medium(Covariance::diagonal(0.04, 0.04, 1.0));
        assert_abs_diff_eq!(medium.sigma_t(&Vec3::unit_z()), Color3::from_value(2.0), epsilon = 1e-12);
        assert_abs_diff_eq!(medium.sigma_t(&Vec3::unit_x()), Color3::from_value(0.4), epsilon = 1e-12);
        assert_abs_diff_eq!(medium.sigma_t(&-Vec3::unit_z()), medium.sigma_t(&Vec3::unit_z()));

        let tr = medium.transmittance(1.5, &Vec3::unit_x());
        assert_abs_diff_eq!(tr, Color3::from_value((-0.6f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn degenerate_flakes_are_transparent() {
        let medium = flat_medium(Covariance::zero());
        let mut sampler = Independent::new(40);
        for _ in 0..100 {
            match medium.sample(10.0, &Vec3::unit_y(), &mut sampler) {
                MediumSample::None { tr } => assert_eq!(tr, Color3::from_value(1.0)),
                MediumSample::Scatter { .. } => panic!("degenerate flakes must not scatter"),
            }
        }
    }

    #[test]
    fn degenerate_flakes_unbounded_ray() {
        let medium = flat_medium(Covariance::zero());
        let mut sampler = Independent::new(44);
        let tr = medium.transmittance(f64::INFINITY, &Vec3::unit_x());
        assert_eq!(tr, Color3::from_value(1.0));
        match medium.sample(f64::INFINITY, &Vec3::unit_x(), &mut sampler) {
            MediumSample::None { tr } => assert_eq!(tr, Color3::from_value(1.0)),
            MediumSample::Scatter { .. } => panic!("degenerate flakes must not scatter"),
        }

        // a dense medium still absorbs everything along an unbounded ray
        let dense = flat_medium(Covariance::diagonal(1.0, 1.0, 1.0));
        assert_eq!(dense.transmittance(f64::INFINITY, &Vec3::unit_x()), Color3::from_value(0.0));
    }

    #[test]
    fn free_path_mean() {
        let medium = flat_medium(Covariance::diagonal(0.25, 0.25, 0.25));
        let mut sampler = Independent::new(41);
        let n = 50_000;
        let mut mean = 0.0;
        for _ in 0..n {
            if let MediumSample::Scatter { t, weight, .. } =
                medium.sample(f64::INFINITY, &Vec3::unit_x(), &mut sampler)
            {
                // no absorption, grey medium
                assert_abs_diff_eq!(weight, Color3::from_value(1.0), epsilon = 1e-9);
                mean += t;
            }
        }
        mean /= f64::from(n);
        // sigma_t = 2 * 0.5
        assert_abs_diff_eq!(mean, 1.0, epsilon = 0.02);
    }

    #[test]
    fn medium_from_json() {
        let _ = env_logger::builder().is_test(true).try_init();
        let json = parse_object(
            r#"{
                "type": "homogeneous",
                "sigma_s": [0.5, 0.6, 0.7],
                "density": 2.0,
                "covariance": [1.0, 0.5, 0.25, 0.0, 0.0, 0.0],
                "phase": { "type": "sggx", "sample_type": "diffuse" }
            }"#,
        );
        let medium = json_to_medium(&json).unwrap();
        let s = medium.covariance(&Point3::origin());
        assert_eq!(s, Covariance::diagonal(1.0, 0.5, 0.25));
        assert_abs_diff_eq!(
            medium.sigma_t(&Vec3::unit_z()),
            Vec3::new(0.5, 0.6, 0.7),
            epsilon = 1e-12
        );

        // the covariance comes from the medium, the phase uses it per point
        let mut sampler = Independent::new(42);
        let mut query = ScatterQuery::new(Vec3::new(0.2, 0.3, 0.9).normalize(), s);
        let weight = medium.phase_function().sample(&mut query, &mut sampler);
        assert_eq!(weight, 1.0);
    }

    #[test]
    fn medium_uses_fiber_covariance() {
        let json = parse_object(
            r#"{
                "type": "homogeneous",
                "phase": { "type": "sggx", "sample_type": "specular", "stddev": 0.1 }
            }"#,
        );
        let medium = json_to_medium(&json).unwrap();
        let phase = MicroflakePhase::with_fiber(LobeMode::Specular, 0.1).unwrap();
        assert_eq!(medium.covariance(&Point3::origin()), phase.fiber_covariance().unwrap());
        assert!(medium.sigma_t(&Vec3::unit_z()).x < medium.sigma_t(&Vec3::unit_x()).x);
        assert!(medium.phase_function().needs_directionally_varying_coefficients());
    }

    #[test]
    fn medium_errors() {
        let no_covariance = parse_object(
            r#"{ "type": "homogeneous", "phase": { "type": "sggx", "sample_type": "specular" } }"#,
        );
        assert!(matches!(
            json_to_medium(&no_covariance),
            Err(crate::Error::AttribNotFound(..))
        ));

        let bad_phase = parse_object(
            r#"{ "type": "homogeneous", "covariance": 1.0, "phase": { "type": "sggx", "sample_type": "glossy" } }"#,
        );
        assert!(matches!(
            json_to_medium(&bad_phase),
            Err(crate::Error::UnknownPhaseMode(_))
        ));

        let unknown = parse_object(r#"{ "type": "heterogeneous" }"#);
        assert!(matches!(json_to_medium(&unknown), Err(crate::Error::InvalidType(_))));
    }

    #[test]
    fn sampler_draws_from_caller() {
        // medium sampling and phase sampling share the same caller owned sampler
        let medium = flat_medium(Covariance::diagonal(1.0, 1.0, 1.0));
        let mut sampler = Independent::new(43);
        let mut a = Independent::new(43);
        medium.sample(1.0, &Vec3::unit_z(), &mut sampler);
        a.next();
        a.next();
        assert_eq!(sampler.next().to_bits(), a.next().to_bits());
    }
}
