use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader};
use ndarray::Array4;
use std::path::Path;

use super::InferenceError;

pub const INPUT_SIZE: usize = 224;
pub const CHANNELS: usize = 3;

pub fn input_shape() -> (usize, usize, usize, usize) {
    (1, INPUT_SIZE, INPUT_SIZE, CHANNELS)
}

pub fn preprocess_path(path: &Path) -> Result<Array4<f32>, InferenceError> {
    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(ImageError::from)?
        .decode()?;
    Ok(preprocess(&image))
}

/// Resizes to 224x224 and produces a `(1, H, W, C)` batch scaled to [0, 1].
///
/// Grayscale sources come out with three identical channels; alpha is dropped.
pub fn preprocess(image: &DynamicImage) -> Array4<f32> {
    let size = INPUT_SIZE as u32;
    let rgb = image
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    Array4::from_shape_fn(input_shape(), |(_, y, x, c)| {
        f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0
    })
}
