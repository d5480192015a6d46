use ndarray::ArrayView4;
use std::path::Path;

use super::{InferenceError, ModelLoadError};
use crate::config::TensorLayout;

/// Maps a preprocessed `(1, 224, 224, 3)` batch to a flat feature vector.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Picks the runtime from the artifact's extension: `.onnx` runs on tract,
/// `.pt`/`.ts` TorchScript runs on libtorch.
pub fn load_extractor(
    path: &Path,
    layout: TensorLayout,
) -> Result<Box<dyn FeatureExtractor>, ModelLoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("onnx") => load_onnx(path, layout),
        Some("pt") | Some("ts") => load_torch(path, layout),
        _ => Err(ModelLoadError::UnsupportedExtractor(path.to_path_buf())),
    }
}

/// Rearranges the NHWC batch into the layout the network was exported with,
/// returning the shape and the contiguous data.
pub fn arrange(input: ArrayView4<'_, f32>, layout: TensorLayout) -> (Vec<usize>, Vec<f32>) {
    let view = match layout {
        TensorLayout::Nhwc => input,
        TensorLayout::Nchw => input.permuted_axes([0, 3, 1, 2]),
    };
    (view.shape().to_vec(), view.iter().copied().collect())
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path, layout: TensorLayout) -> Result<Box<dyn FeatureExtractor>, ModelLoadError> {
    Ok(Box::new(onnx::OnnxExtractor::load(path, layout)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &Path, _layout: TensorLayout) -> Result<Box<dyn FeatureExtractor>, ModelLoadError> {
    Err(ModelLoadError::BackendDisabled("onnx"))
}

#[cfg(feature = "torch")]
fn load_torch(path: &Path, layout: TensorLayout) -> Result<Box<dyn FeatureExtractor>, ModelLoadError> {
    Ok(Box::new(torch::TorchScriptExtractor::load(path, layout)?))
}

#[cfg(not(feature = "torch"))]
fn load_torch(_path: &Path, _layout: TensorLayout) -> Result<Box<dyn FeatureExtractor>, ModelLoadError> {
    Err(ModelLoadError::BackendDisabled("torch"))
}

#[cfg(feature = "onnx")]
mod onnx {
    use ndarray::ArrayView4;
    use std::path::Path;
    use tract_onnx::prelude::*;

    use super::{FeatureExtractor, arrange};
    use crate::config::TensorLayout;
    use crate::inference::preprocess::{CHANNELS, INPUT_SIZE};
    use crate::inference::{InferenceError, ModelLoadError};

    pub struct OnnxExtractor {
        plan: TypedRunnableModel<TypedModel>,
        layout: TensorLayout,
    }

    impl OnnxExtractor {
        pub fn load(path: &Path, layout: TensorLayout) -> Result<Self, ModelLoadError> {
            let shape = match layout {
                TensorLayout::Nhwc => [1, INPUT_SIZE, INPUT_SIZE, CHANNELS],
                TensorLayout::Nchw => [1, CHANNELS, INPUT_SIZE, INPUT_SIZE],
            };

            let plan = tract_onnx::onnx()
                .model_for_path(path)
                .and_then(|model| model.with_input_fact(0, f32::fact(shape).into()))
                .and_then(|model| model.into_optimized())
                .and_then(|model| model.into_runnable())
                .map_err(|e| ModelLoadError::Extractor(format!("{}: {}", path.display(), e)))?;

            log::info!("Loaded ONNX feature extractor from {} ({})", path.display(), layout);
            Ok(Self { plan, layout })
        }
    }

    impl FeatureExtractor for OnnxExtractor {
        fn extract(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            let (shape, data) = arrange(input, self.layout);
            let tensor = Tensor::from_shape(&shape, &data)
                .map_err(|e| InferenceError::Extractor(e.to_string()))?;

            let outputs = self
                .plan
                .run(tvec!(tensor.into()))
                .map_err(|e| InferenceError::Extractor(e.to_string()))?;
            let output = outputs
                .first()
                .ok_or_else(|| InferenceError::Extractor("model produced no outputs".to_string()))?;

            let features = output
                .to_array_view::<f32>()
                .map_err(|e| InferenceError::Extractor(e.to_string()))?
                .iter()
                .copied()
                .collect();
            Ok(features)
        }
    }
}

#[cfg(feature = "torch")]
mod torch {
    use ndarray::ArrayView4;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor, nn::ModuleT};

    use super::{FeatureExtractor, arrange};
    use crate::config::TensorLayout;
    use crate::inference::{InferenceError, ModelLoadError};

    pub struct TorchScriptExtractor {
        model: Mutex<CModule>,
        device: Device,
        layout: TensorLayout,
    }

    impl TorchScriptExtractor {
        pub fn load(path: &Path, layout: TensorLayout) -> Result<Self, ModelLoadError> {
            let device = Device::cuda_if_available();
            let model = CModule::load_on_device(path, device)
                .map_err(|e| ModelLoadError::Extractor(format!("{}: {}", path.display(), e)))?;

            log::info!(
                "Loaded TorchScript feature extractor from {} on {:?} ({})",
                path.display(),
                device,
                layout
            );
            Ok(Self {
                model: Mutex::new(model),
                device,
                layout,
            })
        }
    }

    impl FeatureExtractor for TorchScriptExtractor {
        fn extract(&self, input: ArrayView4<'_, f32>) -> Result<Vec<f32>, InferenceError> {
            let (shape, data) = arrange(input, self.layout);
            let dims: Vec<i64> = shape.iter().map(|&d| d as i64).collect();
            let tensor = Tensor::from_slice(&data)
                .view(dims.as_slice())
                .to_device(self.device);

            let model = self
                .model
                .lock()
                .map_err(|_| InferenceError::Extractor("model lock poisoned".to_string()))?;
            let output = tch::no_grad(|| model.forward_t(&tensor, false));
            let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);

            Vec::<f32>::try_from(&output_flat).map_err(|e| InferenceError::Extractor(e.to_string()))
        }
    }
}
