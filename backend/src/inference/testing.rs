//! In-memory stand-ins for the model artifacts.

use image::{ImageFormat, Rgb, RgbImage};
use ndarray::ArrayView4;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::InferenceError;
use super::classifier::ModelBundle;
use super::extractor::FeatureExtractor;

/// Emits a single feature: the mean pixel intensity of the batch.
pub struct MeanExtractor;

impl FeatureExtractor for MeanExtractor {
    fn extract(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        Ok(vec![input.mean().unwrap_or(0.0)])
    }
}

pub struct FailingExtractor;

impl FeatureExtractor for FailingExtractor {
    fn extract(&self, _input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        Err(InferenceError::Extractor(
            "simulated failure in /opt/models/extractor.onnx".to_string(),
        ))
    }
}

/// Bright images classify as authentic (label 1), dark ones as counterfeit.
pub fn mean_bundle() -> ModelBundle {
    let json = r#"{
        "scaler": { "mean": [0.5], "scale": [0.25] },
        "classifier": {
            "kind": "logistic_regression",
            "classes": [0, 1],
            "coef": [[4.0]],
            "intercept": [0.0]
        }
    }"#;
    ModelBundle::from_slice(json.as_bytes()).expect("test bundle is valid")
}

pub fn solid_png(width: u32, height: u32, level: u8) -> Vec<u8> {
    rgb_png(width, height, [level, level, level])
}

pub fn rgb_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::from_pixel(width, height, Rgb(rgb))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("png encoding succeeds");
    buf
}

/// Checked-in model artifacts under `tests/fixtures`: two single-node ONNX
/// graphs emitting per-channel means (one per layout) and a bundle that
/// favours red over blue.
#[cfg(feature = "onnx")]
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
