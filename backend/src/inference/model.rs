use ndarray::{Array4, ArrayView4};
use shared::AnalysisResponse;
use std::path::Path;
use std::sync::Arc;

use super::classifier::{Classifier, ModelBundle, StandardScaler};
use super::extractor::{FeatureExtractor, load_extractor};
use super::preprocess::{input_shape, preprocess_path};
use super::{InferenceError, ModelLoadError};
use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub is_authentic: bool,
    pub confidence: f32,
}

impl From<Verdict> for AnalysisResponse {
    fn from(verdict: Verdict) -> Self {
        AnalysisResponse::complete(verdict.is_authentic, verdict.confidence)
    }
}

/// The loaded artifacts, shared read-only by every request.
#[derive(Clone)]
pub struct Analyzer {
    extractor: Arc<dyn FeatureExtractor>,
    scaler: StandardScaler,
    classifier: Classifier,
}

impl Analyzer {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, bundle: ModelBundle) -> Self {
        Self {
            extractor,
            scaler: bundle.scaler,
            classifier: bundle.classifier,
        }
    }

    pub fn load(config: &AppConfig) -> Result<Self, ModelLoadError> {
        let bundle = ModelBundle::load(&config.model_bundle_path)?;
        let extractor = load_extractor(&config.feature_extractor_path, config.tensor_layout)?;
        let analyzer = Self::new(Arc::from(extractor), bundle);
        analyzer.warm_up()?;
        Ok(analyzer)
    }

    /// Pushes a blank batch through the whole pipeline so a network whose
    /// output width disagrees with the bundle fails at startup, not per request.
    pub fn warm_up(&self) -> Result<(), ModelLoadError> {
        let verdict = self.analyze_tensor(Array4::<f32>::zeros(input_shape()).view())?;
        log::debug!("Warm-up verdict: {:?}", verdict);
        Ok(())
    }

    pub fn analyze_file(&self, path: &Path) -> Result<Verdict, InferenceError> {
        let tensor = preprocess_path(path)?;
        self.analyze_tensor(tensor.view())
    }

    pub fn analyze_tensor(&self, tensor: ArrayView4<'_, f32>) -> Result<Verdict, InferenceError> {
        let features = self.extractor.extract(tensor)?;
        let scaled = self.scaler.transform(&features)?;
        let prediction = self.classifier.predict(scaled.view())?;

        Ok(Verdict {
            is_authentic: prediction.label != 0,
            confidence: prediction.confidence(),
        })
    }
}
