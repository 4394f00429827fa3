use std::path::Path;

use crate::array2d::Array2d;
use crate::vec::{Color3, to_srgb};
use image::{DynamicImage, GenericImage};

/// Save an image, `.exr` keeps linear HDR values, other formats are tone mapped to sRGB
pub fn image_save(path: &str, data: &Array2d<Color3>) -> crate::Result<()> {
    let output_ext = Path::new(path)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .ok_or_else(|| crate::Error::InvalidType(format!("no file extension in {path}")))?;

    if output_ext == "exr" {
        let mut image_hdr = DynamicImage::new_rgb32f(data.size_x(), data.size_y()).to_rgb32f();
        for x in 0..data.size_x() {
            for y in 0..data.size_y() {
                let p = data.at(x, y);
                image_hdr.put_pixel(x, y, image::Rgb([p[0] as f32, p[1] as f32, p[2] as f32]));
            }
        }
        image_hdr
            .save(Path::new(path))
            .map_err(|e| crate::Error::Other(Box::new(e)))?;
    } else {
        let mut image_ldr = DynamicImage::new_rgb8(data.size_x(), data.size_y());
        for x in 0..data.size_x() {
            for y in 0..data.size_y() {
                let p = to_srgb(data.at(x, y));
                image_ldr.put_pixel(
                    x,
                    y,
                    image::Rgba([
                        (p[0].clamp(0.0, 1.0) * 255.0) as u8,
                        (p[1].clamp(0.0, 1.0) * 255.0) as u8,
                        (p[2].clamp(0.0, 1.0) * 255.0) as u8,
                        255,
                    ]),
                );
            }
        }
        image_ldr
            .save(Path::new(path))
            .map_err(|e| crate::Error::Other(Box::new(e)))?;
    }
    Ok(())
}
