use std::collections::HashMap;

use tinyjson::JsonValue;

#[macro_use]
extern crate quick_error;

pub type Real = f64;

pub mod constants {
    use std::f64;

    use crate::Real;
    pub const M_PI: Real = f64::consts::PI;
    pub const INV_PI: Real = f64::consts::FRAC_1_PI;
    pub const INV_TWOPI: Real = 0.159_154_943_091_895_35;
    pub const INV_FOURPI: Real = 0.079_577_471_545_947_67;
    pub const FRAC_PI_4: Real = f64::consts::FRAC_PI_4;
    pub const FRAC_PI_2: Real = f64::consts::FRAC_PI_2;
    /// Below this sum of squared covariance components no flake orientation is defined
    pub const DEGENERATE_SQR_SUM: Real = 1e-6;
}

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Phase function mode string not recognized
        UnknownPhaseMode(name: String) {
            display("Unknown SGGX phase function type {:?}. Support specular and diffuse.", name)
        }
        /// Persisted mode code not recognized
        UnknownModeCode(code: i32) {
            display("Unknown SGGX phase function mode code {}", code)
        }
        /// Parameter outside of its valid range
        InvalidParameter(name: &'static str, value: f64) {
            display("Invalid value for parameter {}: {}", name, value)
        }
        /// InvalidType
        InvalidType(name: String) {
            display("Unknown reference (name: {:?})", name)
        }
        /// Attribute not found
        AttribNotFound(name: String, additional_info: String) {
            display("Impossible to found {} attribute when parsing {}", name, additional_info)
        }
        /// Uncovered case
        UncoveredCase(name: &'static str, json: HashMap<String, JsonValue>) {
            display("Impossible to construct {}, case is not covered {:?}", name, json)
        }
        /// Uncovered case
        UncoveredCaseJson(name: &'static str, json: JsonValue) {
            display("Impossible to construct {}, JSON object case non unhandled {:?}", name, json)
        }
        /// Wrong dimension
        WrongDimensionJson(name: &'static str, json: Vec<JsonValue>, dim_expected: usize) {
            display("Impossible to construct {}, Wrong dimension provided (expected: {}, got {}) {:?}", name, dim_expected, json.len(), json)
        }
        /// Other error
        Other(err: Box<dyn std::error::Error>) {
            source(&**err)
        }
    }
}
pub type Result<T> = std::result::Result<T, Error>;

pub mod array2d;
pub mod covariance;
pub mod image;
pub mod json;
pub mod medium;
pub mod phase;
pub mod samplers;
pub mod utils;
pub mod vec;
