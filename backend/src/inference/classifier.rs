use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use std::path::Path;

use super::{InferenceError, ModelLoadError};

/// Scaler and classifier fitted together, exported as JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelBundle {
    pub scaler: StandardScaler,
    pub classifier: Classifier,
}

impl ModelBundle {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle = Self::from_slice(&bytes)?;
        log::info!(
            "Loaded model bundle from {} ({} features, {} classes)",
            path.display(),
            bundle.scaler.n_features(),
            bundle.classifier.classes().len()
        );
        Ok(bundle)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelLoadError> {
        let bundle: ModelBundle = serde_json::from_slice(bytes)?;
        bundle.validate()?;
        Ok(bundle)
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        let n_features = self.scaler.n_features();
        if n_features == 0 {
            return Err(ModelLoadError::Invalid("scaler has no features".to_string()));
        }
        if self.scaler.scale.len() != n_features {
            return Err(ModelLoadError::Invalid(format!(
                "scaler mean has {} entries but scale has {}",
                n_features,
                self.scaler.scale.len()
            )));
        }
        if self.classifier.n_features() != n_features {
            return Err(ModelLoadError::Invalid(format!(
                "classifier expects {} features but scaler has {}",
                self.classifier.n_features(),
                n_features
            )));
        }
        Ok(())
    }
}

/// Standardization with a pre-fit mean and scale per feature.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl StandardScaler {
    #[cfg(test)]
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Self {
        Self { mean, scale }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &[f32]) -> Result<Array1<f32>, InferenceError> {
        if features.len() != self.n_features() {
            return Err(InferenceError::Shape {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // zero-variance features are left unscaled
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: i64,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Probability of the predicted class, i.e. the maximum class probability.
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .iter()
            .copied()
            .fold(0.0_f32, f32::max)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    LogisticRegression(LogisticRegression),
}

impl Classifier {
    pub fn n_features(&self) -> usize {
        match self {
            Classifier::LogisticRegression(model) => model.coef.ncols(),
        }
    }

    pub fn classes(&self) -> &[i64] {
        match self {
            Classifier::LogisticRegression(model) => &model.classes,
        }
    }

    pub fn predict(&self, features: ArrayView1<'_, f32>) -> Result<Prediction, InferenceError> {
        let probabilities = match self {
            Classifier::LogisticRegression(model) => model.predict_proba(features)?,
        };

        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::Classifier(
                "classifier produced non-finite probabilities".to_string(),
            ));
        }

        let (best, _) = probabilities
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |(best, max), (i, &p)| {
                if p > max { (i, p) } else { (best, max) }
            });

        Ok(Prediction {
            label: self.classes()[best],
            probabilities,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawLogisticRegression {
    classes: Vec<i64>,
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
}

/// Linear model with one coefficient row for binary problems and one row
/// per class for multinomial ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLogisticRegression")]
pub struct LogisticRegression {
    classes: Vec<i64>,
    coef: Array2<f32>,
    intercept: Array1<f32>,
}

impl TryFrom<RawLogisticRegression> for LogisticRegression {
    type Error = String;

    fn try_from(raw: RawLogisticRegression) -> Result<Self, Self::Error> {
        let rows = raw.coef.len();
        let cols = raw.coef.first().map(Vec::len).unwrap_or(0);

        if raw.classes.len() < 2 {
            return Err("logistic regression needs at least two classes".to_string());
        }
        let expected_rows = if raw.classes.len() == 2 { 1 } else { raw.classes.len() };
        if rows != expected_rows {
            return Err(format!(
                "{} classes need {} coefficient rows, got {}",
                raw.classes.len(),
                expected_rows,
                rows
            ));
        }
        if raw.intercept.len() != rows {
            return Err(format!(
                "expected {} intercepts, got {}",
                rows,
                raw.intercept.len()
            ));
        }
        if cols == 0 || raw.coef.iter().any(|row| row.len() != cols) {
            return Err("coefficient rows must be non-empty and equally sized".to_string());
        }

        let coef = Array2::from_shape_vec((rows, cols), raw.coef.into_iter().flatten().collect())
            .map_err(|e| e.to_string())?;

        Ok(Self {
            classes: raw.classes,
            coef,
            intercept: Array1::from(raw.intercept),
        })
    }
}

impl LogisticRegression {
    pub fn predict_proba(&self, features: ArrayView1<'_, f32>) -> Result<Vec<f32>, InferenceError> {
        if features.len() != self.coef.ncols() {
            return Err(InferenceError::Shape {
                expected: self.coef.ncols(),
                actual: features.len(),
            });
        }

        let scores = self.coef.dot(&features) + &self.intercept;
        if scores.len() == 1 {
            let positive = sigmoid(scores[0]);
            return Ok(vec![1.0 - positive, positive]);
        }
        Ok(softmax(scores.view()))
    }
}

fn sigmoid(z: f32) -> f32 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn softmax(scores: ArrayView1<'_, f32>) -> Vec<f32> {
    let max = scores.fold(f32::MIN, |m, &s| m.max(s));
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
