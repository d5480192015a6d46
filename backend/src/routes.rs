use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{AnalysisResponse, HealthResponse};
use uuid::Uuid;

use crate::error::{AnalyzeError, ProcessingError};
use crate::inference::model::{Analyzer, Verdict};
use crate::storage::upload::{
    TempUpload, UploadSettings, allowed_extension, calculate_image_hash, validate_upload_size,
};

const IMAGE_FIELD: &str = "image";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/analyze-medicine").route(web::post().to(analyze_medicine)))
        .service(web::resource("/api/health").route(web::get().to(health)));
}

struct ImageUpload {
    extension: String,
    data: Vec<u8>,
}

async fn analyze_medicine(
    analyzer: web::Data<Analyzer>,
    uploads: web::Data<UploadSettings>,
    payload: Multipart,
) -> Result<HttpResponse, AnalyzeError> {
    let request_id = Uuid::new_v4();

    let upload = read_image_field(payload, uploads.max_bytes)
        .await
        .inspect_err(|e| warn!("Rejected upload {}: {}", request_id, e))?;

    info!(
        "Analyzing upload {} ({} bytes, sha256 {})",
        request_id,
        upload.data.len(),
        calculate_image_hash(&upload.data)
    );

    let analyzer = analyzer.into_inner();
    let upload_dir = uploads.dir.clone();
    let verdict = web::block(move || -> Result<Verdict, ProcessingError> {
        let temp = TempUpload::write(&upload_dir, &upload.extension, &upload.data)?;
        Ok(analyzer.analyze_file(temp.path())?)
    })
    .await
    .map_err(|e| ProcessingError::Blocking(e.to_string()))
    .and_then(|result| result)
    .map_err(|e| {
        error!("Analysis {} failed: {}", request_id, e);
        AnalyzeError::from(e)
    })?;

    info!(
        "Analysis {} complete: authentic={} confidence={:.4}",
        request_id, verdict.is_authentic, verdict.confidence
    );
    Ok(HttpResponse::Ok().json(AnalysisResponse::from(verdict)))
}

/// Pulls the first `image` file part out of the form.
///
/// A part named `image` without a filename parameter is an ordinary form
/// field, not a file, and is skipped like any other field. A request that
/// is not multipart at all carries no image; a multipart body that breaks
/// off mid-stream is malformed.
async fn read_image_field(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<ImageUpload, AnalyzeError> {
    loop {
        let mut field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AnalyzeError::NoImage),
            Err(
                MultipartError::ContentTypeMissing
                | MultipartError::ContentTypeParse
                | MultipartError::ContentTypeIncompatible
                | MultipartError::BoundaryMissing,
            ) => return Err(AnalyzeError::NoImage),
            Err(e) => {
                warn!("Multipart stream error: {}", e);
                return Err(AnalyzeError::MalformedUpload);
            }
        };

        let filename = field.content_disposition().and_then(|cd| {
            cd.get_filename().map(str::to_owned).or_else(|| {
                cd.get_filename_ext()
                    .map(|ext| String::from_utf8_lossy(&ext.value).into_owned())
            })
        });

        let filename = match filename {
            Some(filename) if field.name() == Some(IMAGE_FIELD) => filename,
            _ => {
                drain(&mut field).await?;
                continue;
            }
        };

        if filename.is_empty() {
            return Err(AnalyzeError::NoSelectedFile);
        }
        let extension = allowed_extension(&filename).ok_or(AnalyzeError::InvalidFileType)?;

        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|_| AnalyzeError::MalformedUpload)?
        {
            validate_upload_size(data.len() + chunk.len(), max_bytes)?;
            data.extend_from_slice(&chunk);
        }

        return Ok(ImageUpload { extension, data });
    }
}

async fn drain(field: &mut Field) -> Result<(), AnalyzeError> {
    while field
        .try_next()
        .await
        .map_err(|_| AnalyzeError::MalformedUpload)?
        .is_some()
    {}
    Ok(())
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}
