use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Memory layout the feature extractor expects for its single input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    #[default]
    Nhwc,
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorLayout::Nhwc => write!(f, "nhwc"),
            TensorLayout::Nchw => write!(f, "nchw"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub model_bundle_path: PathBuf,
    pub feature_extractor_path: PathBuf,
    pub tensor_layout: TensorLayout,
    pub max_upload_bytes: usize,
    // Read for parity with the deployment environment; nothing consumes them.
    #[serde(skip)]
    pub mongodb_uri: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            upload_dir: PathBuf::from("uploads"),
            model_bundle_path: PathBuf::from("fake_medicine_detection_model.json"),
            feature_extractor_path: PathBuf::from("fake_medicine_detection_model.onnx"),
            tensor_layout: TensorLayout::Nhwc,
            max_upload_bytes: 5_000_000,
            mongodb_uri: None,
            secret_key: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an optional YAML base (`APP_CONFIG`) with
    /// individual variables layered on top.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("APP_CONFIG").filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::from_yaml_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.host = host;
        }
        if let Some(port) = get("PORT") {
            self.port = parse_var("PORT", port)?;
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("MODEL_BUNDLE_PATH") {
            self.model_bundle_path = PathBuf::from(path);
        }
        if let Some(path) = get("FEATURE_EXTRACTOR_PATH") {
            self.feature_extractor_path = PathBuf::from(path);
        }
        if let Some(layout) = get("TENSOR_LAYOUT") {
            self.tensor_layout = layout.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TENSOR_LAYOUT",
                value: layout.clone(),
            })?;
        }
        if let Some(limit) = get("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", limit)?;
        }
        self.mongodb_uri = get("MONGODB_URI");
        self.secret_key = get("SECRET_KEY");
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_UPLOAD_BYTES",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
