use std::{collections::HashMap, fmt, str::FromStr};

use cgmath::{InnerSpace, Zero};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tinyjson::JsonValue;

use crate::{
    constants::INV_PI,
    covariance::Covariance,
    json::{json_to_f64, json_to_string},
    samplers::{Sampler, disk_to_hemisphere, sample_concentric_disk},
    vec::{Frame, Vec2, Vec3},
};

use super::{
    FiberDistribution, PhaseFunction, PhaseSample, ScatterQuery,
    sggx::{ndf, sample_visible_normal, sigma},
};

/// Sentinel for "no fiber model, the covariance comes from the medium"
pub const NO_FIBER_STDDEV: f64 = -1.0;

/// Reflection behaviour of a single flake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum LobeMode {
    /// Mirror flakes
    Specular = 1,
    /// Lambertian flakes
    Diffuse = 2,
}

impl LobeMode {
    /// Integer code used when persisting the phase function
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl From<LobeMode> for i32 {
    fn from(mode: LobeMode) -> Self {
        mode.code()
    }
}

impl TryFrom<i32> for LobeMode {
    type Error = crate::Error;

    fn try_from(code: i32) -> crate::Result<Self> {
        match code {
            1 => Ok(Self::Specular),
            2 => Ok(Self::Diffuse),
            _ => Err(crate::Error::UnknownModeCode(code)),
        }
    }
}

impl FromStr for LobeMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "specular" => Ok(Self::Specular),
            "diffuse" => Ok(Self::Diffuse),
            _ => Err(crate::Error::UnknownPhaseMode(s.to_string())),
        }
    }
}

impl fmt::Display for LobeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Specular => write!(f, "specular"),
            Self::Diffuse => write!(f, "diffuse"),
        }
    }
}

/// SGGX microflake phase function with a single specular or diffuse lobe.
///
/// Immutable once built: every per-call quantity lives in the
/// [`ScatterQuery`] and the sampler handed by the caller, so one instance
/// can be shared between all rendering threads.
///
/// Only the lobe mode is persisted, the fiber model is configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroflakePhase {
    mode: LobeMode,
    #[serde(skip)]
    fiber: Option<FiberDistribution>,
}

impl MicroflakePhase {
    #[must_use]
    pub const fn new(mode: LobeMode) -> Self {
        Self { mode, fiber: None }
    }

    /// Phase function with a fixed Gaussian fiber orientation model
    pub fn with_fiber(mode: LobeMode, stddev: f64) -> crate::Result<Self> {
        Ok(Self {
            mode,
            fiber: Some(FiberDistribution::new(stddev)?),
        })
    }

    pub fn from_json(json: &HashMap<String, JsonValue>) -> crate::Result<Self> {
        if !json.contains_key("sample_type") {
            return Err(crate::Error::AttribNotFound(
                "sample_type".to_string(),
                "SGGX phase function".to_string(),
            ));
        }
        let sample_type = json_to_string(json, "sample_type", "");
        let mode = sample_type.parse::<LobeMode>().inspect_err(|e| error!("{e}"))?;

        let stddev = json_to_f64(json, "stddev", NO_FIBER_STDDEV);
        let phase = if stddev == NO_FIBER_STDDEV {
            Self::new(mode)
        } else {
            Self::with_fiber(mode, stddev).inspect_err(|e| error!("{e}"))?
        };
        info!("Created {phase}");
        Ok(phase)
    }

    /// Rebuild from a persisted mode code
    pub fn from_mode_code(code: i32) -> crate::Result<Self> {
        Ok(Self::new(LobeMode::try_from(code)?))
    }

    #[must_use]
    pub const fn mode(&self) -> LobeMode {
        self.mode
    }

    #[must_use]
    pub const fn fiber(&self) -> Option<&FiberDistribution> {
        self.fiber.as_ref()
    }

    /// Covariance of the fiber model (`None` when the medium supplies it per point)
    #[must_use]
    pub fn fiber_covariance(&self) -> Option<Covariance> {
        self.fiber.as_ref().map(FiberDistribution::covariance)
    }

    /// Fiber projected area seen at `cos_theta` from the fiber axis.
    ///
    /// Scaled such that replacing an isotropic phase function with an
    /// isotropic microflake distribution does not change the medium.
    #[must_use]
    pub fn sigma_dir(&self, cos_theta: f64) -> f64 {
        self.fiber
            .as_ref()
            .map_or(0.0, |fiber| 2.0 * fiber.sigma_t(cos_theta))
    }

    #[must_use]
    pub fn sigma_dir_max(&self) -> f64 {
        self.sigma_dir(0.0)
    }

    /// Draws the visible normal and the outgoing direction.
    /// Returns `(wo, wm)` or `None` when no direction is defined.
    fn sample_lobe(
        &self,
        wi: &Vec3,
        s: &Covariance,
        sampler: &mut dyn Sampler,
    ) -> Option<(Vec3, Vec3)> {
        if s.is_degenerate() {
            return None;
        }

        let wm = sample_visible_normal(wi, s, sampler);
        if wm.is_zero() {
            return None;
        }

        let wo = match self.mode {
            LobeMode::Specular => (-*wi + 2.0 * wm.dot(*wi) * wm).normalize(),
            LobeMode::Diffuse => {
                let u1 = sampler.next();
                let u2 = sampler.next();
                let local = disk_to_hemisphere(&sample_concentric_disk(&Vec2::new(u1, u2)));
                Frame::new(&wm).to_world(&local).normalize()
            }
        };
        Some((wo, wm))
    }
}

impl PhaseFunction for MicroflakePhase {
    fn evaluate(&self, query: &ScatterQuery, sampler: &mut dyn Sampler) -> f64 {
        let ScatterQuery { wi, wo, covariance } = query;
        if covariance.is_degenerate() {
            return 0.0;
        }

        match self.mode {
            LobeMode::Specular => {
                let h = *wi + *wo;
                let length = h.magnitude();
                if length == 0.0 {
                    return 0.0;
                }
                let sigma_wi = sigma(wi, covariance);
                if sigma_wi == 0.0 {
                    return 0.0;
                }
                0.25 * ndf(&(h / length), covariance) / sigma_wi
            }
            LobeMode::Diffuse => {
                // one sample estimate over the visible normals
                let wm = sample_visible_normal(wi, covariance, sampler);
                INV_PI * wo.dot(wm).max(0.0)
            }
        }
    }

    fn sample(&self, query: &mut ScatterQuery, sampler: &mut dyn Sampler) -> f64 {
        match self.sample_lobe(&query.wi, &query.covariance, sampler) {
            Some((wo, _)) => {
                query.wo = wo;
                1.0
            }
            None => 0.0,
        }
    }

    /// The diffuse density is the cosine lobe of the visible normal that
    /// produced `wo`, not the marginal density. It is biased upwards:
    /// on average it is at least the value `evaluate` estimates with a fresh
    /// normal, so MIS weights built from it favour this strategy.
    fn sample_with_pdf(&self, query: &mut ScatterQuery, sampler: &mut dyn Sampler) -> PhaseSample {
        let Some((wo, wm)) = self.sample_lobe(&query.wi, &query.covariance, sampler) else {
            return PhaseSample::zero();
        };
        query.wo = wo;

        let pdf = match self.mode {
            LobeMode::Specular => self.evaluate(query, sampler),
            LobeMode::Diffuse => INV_PI * wo.dot(wm).max(0.0),
        };
        PhaseSample { weight: 1.0, pdf }
    }

    fn projected_area(&self, d: &Vec3, covariance: &Covariance) -> f64 {
        sigma(d, covariance)
    }

    fn fixed_covariance(&self) -> Option<Covariance> {
        self.fiber_covariance()
    }

    fn needs_directionally_varying_coefficients(&self) -> bool {
        true
    }
}

impl fmt::Display for MicroflakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MicroflakePhase[sample_type = {}", self.mode)?;
        if let Some(fiber) = &self.fiber {
            write!(f, ", stddev = {}", fiber.stddev())?;
        }
        write!(f, "]")
    }
}
