use std::collections::HashMap;

use tinyjson::JsonValue;

use crate::{covariance::Covariance, vec::Vec3};

pub fn json_to_f64(json: &HashMap<String, JsonValue>, name: &str, default: f64) -> f64 {
    if !json.contains_key(name) {
        return default;
    }

    let json_val = &json[name];
    match json_val {
        JsonValue::Number(v) => *v,
        _ => default,
    }
}

pub fn json_to_string(json: &HashMap<String, JsonValue>, name: &str, default: &str) -> String {
    if !json.contains_key(name) {
        return default.to_string();
    }

    let json_val = &json[name];
    match json_val {
        JsonValue::String(v) => v.clone(),
        _ => default.to_string(),
    }
}

fn json_to_numbers(name: &'static str, json: &[JsonValue], dim: usize) -> crate::Result<Vec<f64>> {
    if json.len() != dim {
        return Err(crate::Error::WrongDimensionJson(name, json.to_vec(), dim));
    }
    json.iter()
        .map(|v| match v {
            JsonValue::Number(v) => Ok(*v),
            _ => Err(crate::Error::UncoveredCaseJson(name, v.clone())),
        })
        .collect()
}

struct JsonVec3(Vec3);
impl TryFrom<JsonValue> for JsonVec3 {
    type Error = crate::Error;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Number(v) => Ok(Self(Vec3::new(v, v, v))),
            JsonValue::Array(v) => {
                let v = json_to_numbers("vec3", &v, 3)?;
                Ok(Self(Vec3::new(v[0], v[1], v[2])))
            }
            _ => Err(crate::Error::UncoveredCaseJson("vec3", value)),
        }
    }
}

/// Accepts either the six components `[xx, yy, zz, xy, xz, yz]`, a single
/// number (isotropic) or an object `{"normal": [..], "roughness": r}`.
struct JsonCovariance(Covariance);
impl TryFrom<JsonValue> for JsonCovariance {
    type Error = crate::Error;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Number(v) => Ok(Self(Covariance::diagonal(v, v, v))),
            JsonValue::Array(v) => {
                let v = json_to_numbers("covariance", &v, 6)?;
                Ok(Self(Covariance::new(v[0], v[1], v[2], v[3], v[4], v[5])))
            }
            JsonValue::Object(json) => {
                if !json.contains_key("normal") {
                    return Err(crate::Error::UncoveredCase("covariance", json));
                }
                let n: JsonVec3 = json["normal"].clone().try_into()?;
                let roughness = json_to_f64(&json, "roughness", 1.0);
                Ok(Self(Covariance::from_surface(
                    &cgmath::InnerSpace::normalize(n.0),
                    roughness,
                )))
            }
            _ => Err(crate::Error::UncoveredCaseJson("covariance", value)),
        }
    }
}

pub fn json_to_vec3(json: &HashMap<String, JsonValue>, name: &str, default: Vec3) -> Vec3 {
    if !json.contains_key(name) {
        return default;
    }

    let json_val = json[name].clone();
    match TryInto::<JsonVec3>::try_into(json_val) {
        Err(_) => default,
        Ok(v) => v.0,
    }
}

/// Unlike the other helpers a malformed value is reported instead of replaced by a default
pub fn json_to_covariance(
    json: &HashMap<String, JsonValue>,
    name: &str,
) -> crate::Result<Option<Covariance>> {
    if !json.contains_key(name) {
        return Ok(None);
    }

    let v: JsonCovariance = json[name].clone().try_into()?;
    Ok(Some(v.0))
}
