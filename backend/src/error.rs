use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::InferenceError;

/// Request-level failures of the analyze endpoint.
///
/// Display text is what the caller sees, so `Processing` stays opaque and
/// its source is only ever logged.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("No image provided")]
    NoImage,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("Invalid file type")]
    InvalidFileType,
    #[error("Malformed upload")]
    MalformedUpload,
    #[error("File too large")]
    FileTooLarge,
    #[error("Failed to analyze image")]
    Processing(#[from] ProcessingError),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Temp file error: {0}")]
    TempFile(#[from] std::io::Error),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Blocking task failed: {0}")]
    Blocking(String),
}

impl ResponseError for AnalyzeError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::NoImage
            | AnalyzeError::NoSelectedFile
            | AnalyzeError::InvalidFileType
            | AnalyzeError::MalformedUpload => StatusCode::BAD_REQUEST,
            AnalyzeError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AnalyzeError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(AnalyzeError::NoImage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AnalyzeError::NoSelectedFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AnalyzeError::InvalidFileType.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AnalyzeError::MalformedUpload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AnalyzeError::FileTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn processing_errors_hide_their_source() {
        let err = AnalyzeError::from(ProcessingError::Inference(InferenceError::Extractor(
            "CUDA out of memory at /opt/models/extractor.pt".to_string(),
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to analyze image");
    }
}
