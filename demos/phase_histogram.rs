use std::collections::HashMap;

use cgmath::InnerSpace;
use clap::Parser;
use log::info;
use microflake::{
    Result,
    covariance::Covariance,
    image::image_save,
    json::{json_to_covariance, json_to_f64, json_to_vec3},
    phase::{PhaseFunction, ScatterQuery, json_to_phase},
    samplers::{Sampler, json_to_sampler},
    utils::generate_histogram,
    vec::{Vec2u, Vec3},
};
use tinyjson::JsonValue;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON description: `phase`, `sampler`, `wi`, `covariance`, `samples`
    #[arg(short, long)]
    input: Option<String>,

    /// inline JSON, used when no input file is given
    #[arg(short = 'A', long)]
    inline: Option<String>,

    /// prefix of the output images
    #[arg(short, long, default_value = "phase")]
    output: String,

    /// image width (the height is half of it)
    #[arg(short, long, default_value_t = 256)]
    width: u32,
}

const DEFAULT_CONFIG: &str = r#"{
    "phase": { "type": "sggx", "sample_type": "specular" },
    "sampler": { "type": "independent", "seed": 1 },
    "wi": [0.0, 0.6, 0.8],
    "covariance": [0.2, 0.2, 1.0, 0.0, 0.0, 0.0],
    "samples": 32
}"#;

fn parse_config(text: &str) -> Result<HashMap<String, JsonValue>> {
    let json: JsonValue = text
        .parse()
        .map_err(|e| microflake::Error::Other(Box::new(e)))?;
    json.get::<HashMap<String, JsonValue>>()
        .cloned()
        .ok_or_else(|| microflake::Error::UncoveredCaseJson("histogram configuration", json.clone()))
}

fn object<'a>(
    json: &'a HashMap<String, JsonValue>,
    name: &str,
) -> Result<&'a HashMap<String, JsonValue>> {
    json.get(name)
        .and_then(JsonValue::get::<HashMap<String, JsonValue>>)
        .ok_or_else(|| microflake::Error::AttribNotFound(name.to_string(), "histogram".to_string()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let text = match (&args.input, &args.inline) {
        (Some(path), _) => {
            std::fs::read_to_string(path).map_err(|e| microflake::Error::Other(Box::new(e)))?
        }
        (None, Some(inline)) => inline.clone(),
        (None, None) => DEFAULT_CONFIG.to_string(),
    };
    let json = parse_config(&text)?;

    let phase = json_to_phase(object(&json, "phase")?)?;
    let mut sampler = json_to_sampler(object(&json, "sampler")?)?;
    let wi = json_to_vec3(&json, "wi", Vec3::unit_z()).normalize();
    let covariance = json_to_covariance(&json, "covariance")?
        .or_else(|| phase.fixed_covariance())
        .unwrap_or_else(|| Covariance::diagonal(1.0, 1.0, 1.0));
    let samples = json_to_f64(&json, "samples", 32.0).max(1.0) as u32;
    info!("Histogram for wi = {wi:?}, covariance = {covariance:?} ({samples} samples per pixel)");

    let phase: &dyn PhaseFunction = phase.as_ref();
    let pdf = |wo: &Vec3, s: &mut dyn Sampler| {
        phase.evaluate(&ScatterQuery::with_wo(wi, *wo, covariance), s)
    };
    let sample = |s: &mut dyn Sampler| {
        let mut query = ScatterQuery::new(wi, covariance);
        if phase.sample(&mut query, s) == 0.0 {
            None
        } else {
            Some(query.wo)
        }
    };

    let width = args.width.max(2);
    let (pdf_image, hist_image, diff_image, stats) = generate_histogram(
        &pdf,
        &sample,
        samples,
        Vec2u::new(width, width / 2),
        sampler.as_mut(),
    );
    info!("{stats:?}");

    image_save(&format!("{}-pdf.png", args.output), &pdf_image)?;
    image_save(&format!("{}-hist.png", args.output), &hist_image)?;
    image_save(&format!("{}-diff.png", args.output), &diff_image)?;
    Ok(())
}
