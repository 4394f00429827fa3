use std::{collections::HashMap, sync::Arc};

use cgmath::Zero;
use tinyjson::JsonValue;

use crate::{covariance::Covariance, json::json_to_string, samplers::Sampler, vec::Vec3};

pub mod fiber;
pub mod microflake;
pub mod sggx;

pub use fiber::FiberDistribution;
pub use microflake::{LobeMode, MicroflakePhase};

/// Caller owned record of one scattering event.
///
/// `wi` and `wo` both point away from the scattering point. `wo` is written
/// by [`PhaseFunction::sample`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterQuery {
    pub wi: Vec3,
    pub wo: Vec3,
    pub covariance: Covariance,
}

impl ScatterQuery {
    #[must_use]
    pub fn new(wi: Vec3, covariance: Covariance) -> Self {
        Self {
            wi,
            wo: Vec3::zero(),
            covariance,
        }
    }

    #[must_use]
    pub const fn with_wo(wi: Vec3, wo: Vec3, covariance: Covariance) -> Self {
        Self { wi, wo, covariance }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSample {
    pub weight: f64,
    pub pdf: f64,
}

impl PhaseSample {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            weight: 0.0,
            pdf: 0.0,
        }
    }
}

/// Directional scattering inside a participating medium whose
/// orientation statistics are given per point by a [`Covariance`].
pub trait PhaseFunction: Send + Sync {
    /// Density of scattering from `query.wi` to `query.wo`
    fn evaluate(&self, query: &ScatterQuery, sampler: &mut dyn Sampler) -> f64;
    /// Sample `query.wo` and return the sampling weight (0 when no direction is defined)
    fn sample(&self, query: &mut ScatterQuery, sampler: &mut dyn Sampler) -> f64;
    /// Same as `sample` but also returns a density for the sampled direction
    fn sample_with_pdf(&self, query: &mut ScatterQuery, sampler: &mut dyn Sampler) -> PhaseSample {
        let weight = self.sample(query, sampler);
        if weight == 0.0 {
            return PhaseSample::zero();
        }
        PhaseSample {
            weight,
            pdf: self.evaluate(query, sampler),
        }
    }
    /// Projected area seen from `d`, scales the extinction of the medium
    fn projected_area(&self, d: &Vec3, covariance: &Covariance) -> f64;
    /// Covariance fixed at configuration time, if any
    fn fixed_covariance(&self) -> Option<Covariance> {
        None
    }
    fn needs_directionally_varying_coefficients(&self) -> bool {
        false
    }
}

pub fn json_to_phase(json: &HashMap<String, JsonValue>) -> crate::Result<Arc<dyn PhaseFunction>> {
    if !json.contains_key("type") {
        return Err(crate::Error::AttribNotFound(
            "type".to_string(),
            "phase function".to_string(),
        ));
    }

    let t = json_to_string(json, "type", "");
    match t.as_str() {
        "sggx" | "microflake" => Ok(Arc::new(MicroflakePhase::from_json(json)?)),
        _ => Err(crate::Error::InvalidType(t)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tinyjson::JsonValue;

    use super::json_to_phase;

    fn parse_object(s: &str) -> HashMap<String, JsonValue> {
        let parsed: JsonValue = s.parse().unwrap();
        parsed.get::<HashMap<String, JsonValue>>().unwrap().clone()
    }

    #[test]
    fn phase_from_json() {
        let json = parse_object(r#"{ "type": "sggx", "sample_type": "diffuse" }"#);
        let phase = json_to_phase(&json).unwrap();
        assert!(phase.needs_directionally_varying_coefficients());
        assert!(phase.fixed_covariance().is_none());

        let json = parse_object(r#"{ "type": "sggx", "sample_type": "specular", "stddev": 0.1 }"#);
        let phase = json_to_phase(&json).unwrap();
        assert!(phase.fixed_covariance().is_some());
    }

    #[test]
    fn phase_errors() {
        let json = parse_object(r#"{ "sample_type": "diffuse" }"#);
        assert!(matches!(
            json_to_phase(&json),
            Err(crate::Error::AttribNotFound(..))
        ));

        let json = parse_object(r#"{ "type": "henyey-greenstein" }"#);
        assert!(matches!(json_to_phase(&json), Err(crate::Error::InvalidType(_))));

        let json = parse_object(r#"{ "type": "sggx", "sample_type": "bogus" }"#);
        assert!(matches!(
            json_to_phase(&json),
            Err(crate::Error::UnknownPhaseMode(_))
        ));
    }
}
