use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AnalyzeError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

impl From<&AppConfig> for UploadSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
        }
    }
}

/// Returns the lowercased extension when the filename is an accepted image type.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

pub fn validate_upload_size(size: usize, max_bytes: usize) -> Result<(), AnalyzeError> {
    if size > max_bytes {
        return Err(AnalyzeError::FileTooLarge);
    }
    Ok(())
}

pub fn calculate_image_hash(image_data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image_data);
    hex::encode(hasher.finalize())
}

/// An uploaded image parked on disk for the lifetime of one request.
///
/// The name is a fresh v4 uuid, never the client's filename, and the file
/// is removed when the guard drops.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    pub fn write(dir: &Path, extension: &str, data: &[u8]) -> io::Result<Self> {
        let path = dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        let upload = Self { path };
        file.write_all(data)?;
        file.flush()?;
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove temp upload {}: {}", self.path.display(), e);
            }
        }
    }
}
