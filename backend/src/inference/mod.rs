pub mod classifier;
pub mod extractor;
pub mod model;
pub mod preprocess;

#[cfg(test)]
pub mod testing;

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    Preprocessing(#[from] image::ImageError),
    #[error("Feature extractor error: {0}")]
    Extractor(String),
    #[error("Feature vector has {actual} values, expected {expected}")]
    Shape { expected: usize, actual: usize },
    #[error("Classifier error: {0}")]
    Classifier(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed model bundle: {0}")]
    Bundle(#[from] serde_json::Error),
    #[error("Invalid model bundle: {0}")]
    Invalid(String),
    #[error("Failed to load feature extractor: {0}")]
    Extractor(String),
    #[error("Unsupported feature extractor file: {0}")]
    UnsupportedExtractor(PathBuf),
    #[error("Feature extractor backend `{0}` is not enabled in this build")]
    BackendDisabled(&'static str),
    #[error("Models failed warm-up: {0}")]
    WarmUp(#[from] InferenceError),
}
