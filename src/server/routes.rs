//! Course image API routes.
//!
//! `POST /api/courses/images` takes a multipart form, `DELETE` takes JSON.
//! Both answer `{ "data": ... }` on success and `{ "error": ... }` otherwise.

use super::AppState;
use crate::auth::bearer_token;
use crate::image::ResizeOptions;
use crate::models::{
    DataResponse, DeleteImageRequest, DeletedImage, ImageType, ImageUpload, UploadedImage,
};
use crate::{Error, Result};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

const MAX_DIMENSION: u32 = 4096;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage_provider: &'static str,
    pub storage_configured: bool,
}

pub async fn health(State(service): State<AppState>) -> Json<HealthResponse> {
    let storage = service.storage();
    Json(HealthResponse {
        status: "ok",
        storage_provider: storage.name(),
        storage_configured: storage.is_configured(),
    })
}

pub async fn upload_image(
    State(service): State<AppState>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<DataResponse<UploadedImage>>> {
    let user = service.authenticate(bearer_token(&headers)?).await?;
    let multipart =
        multipart.map_err(|e| Error::Validation(format!("Expected multipart form data: {}", e)))?;

    let upload = read_upload_form(multipart).await?;
    let data = service.upload(&user, upload).await?;
    Ok(Json(DataResponse { data }))
}

pub async fn delete_image(
    State(service): State<AppState>,
    headers: HeaderMap,
    body: std::result::Result<Json<DeleteImageRequest>, JsonRejection>,
) -> Result<Json<DataResponse<DeletedImage>>> {
    let user = service.authenticate(bearer_token(&headers)?).await?;
    let Json(request) =
        body.map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?;

    let data = service.delete(&user, request).await?;
    Ok(Json(DataResponse { data }))
}

struct FilePart {
    content_type: String,
    file_name: Option<String>,
    data: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<FilePart>,
    course_id: Option<String>,
    instructor_id: Option<String>,
    quality: Option<String>,
    max_width: Option<String>,
    max_height: Option<String>,
    image_type: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<ImageUpload> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        Error::Validation(format!("Could not read multipart body: {}", e))
    })? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "image" || name == "file" {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let file_name = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::Validation(format!("Could not read image upload: {}", e)))?;
            form.file = Some(FilePart {
                content_type,
                file_name,
                data: data.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| Error::Validation(format!("Could not read field {}: {}", name, e)))?;
        let value = value.trim().to_string();
        match name.as_str() {
            "courseId" => form.course_id = Some(value),
            "instructorId" => form.instructor_id = Some(value),
            "quality" => form.quality = Some(value),
            "maxWidth" => form.max_width = Some(value),
            "maxHeight" => form.max_height = Some(value),
            "imageType" => form.image_type = Some(value),
            other => tracing::debug!("Ignoring unknown form field {}", other),
        }
    }

    form.into_upload()
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation(format!("{} is required", name)))
}

fn parse_bounded(value: Option<&str>, name: &str, min: u32, max: u32, default: u32) -> Result<u32> {
    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    let parsed: u32 = raw
        .parse()
        .map_err(|_| Error::Validation(format!("{} must be an integer", name)))?;
    if !(min..=max).contains(&parsed) {
        return Err(Error::Validation(format!(
            "{} must be between {} and {}",
            name, min, max
        )));
    }
    Ok(parsed)
}

impl UploadForm {
    fn into_upload(self) -> Result<ImageUpload> {
        let file = self
            .file
            .ok_or_else(|| Error::Validation("No image file provided".to_string()))?;
        let course_id = required(self.course_id, "courseId")?;
        let instructor_id = required(self.instructor_id, "instructorId")?;

        let defaults = ResizeOptions::default();
        let options = ResizeOptions {
            quality: parse_bounded(
                self.quality.as_deref(),
                "quality",
                1,
                100,
                defaults.quality as u32,
            )? as u8,
            max_width: parse_bounded(
                self.max_width.as_deref(),
                "maxWidth",
                1,
                MAX_DIMENSION,
                defaults.max_width,
            )?,
            max_height: parse_bounded(
                self.max_height.as_deref(),
                "maxHeight",
                1,
                MAX_DIMENSION,
                defaults.max_height,
            )?,
        };
        let image_type = match self.image_type.as_deref() {
            Some(value) => ImageType::parse(value)?,
            None => ImageType::default(),
        };

        Ok(ImageUpload {
            course_id,
            instructor_id,
            image_type,
            content_type: file.content_type,
            original_name: file.file_name,
            data: file.data,
            options,
        })
    }
}
