//! Course image upload and removal.
//!
//! Each request runs as a straight line: authorize the caller against the
//! course, validate the file, resize, upload original and thumbnail, then
//! record the result on the course document.

use crate::auth::{AuthenticatedUser, TokenVerifier};
use crate::firestore::CourseRepository;
use crate::image::{detect_image_mime, ImageService, ProcessedImage, ALLOWED_IMAGE_TYPES};
use crate::models::{
    Course, CourseUpdate, DeleteImageRequest, DeletedImage, ImageType, ImageUpload, UploadedImage,
};
use crate::storage::{thumbnail_path, StorageProvider, UploadResult};
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;
const UPLOAD_RETRY_INTERVAL_MS: u64 = 500;
const UPLOAD_RETRIES: usize = 2;

/// Injectable service bundle used to construct [`CourseImageService`].
#[derive(Clone)]
pub struct ServiceDeps {
    pub verifier: Arc<dyn TokenVerifier>,
    pub courses: Arc<dyn CourseRepository>,
    pub storage: Arc<dyn StorageProvider>,
    pub images: Arc<dyn ImageService>,
}

pub struct CourseImageService {
    verifier: Arc<dyn TokenVerifier>,
    courses: Arc<dyn CourseRepository>,
    storage: Arc<dyn StorageProvider>,
    images: Arc<dyn ImageService>,
}

/// `courseId` names both a Firestore document and a storage directory, so it
/// is limited to `[A-Za-z0-9_-]`.
pub fn validate_course_id(course_id: &str) -> Result<()> {
    if course_id.is_empty() {
        return Err(Error::Validation("courseId is required".to_string()));
    }
    let valid = course_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(Error::Validation(format!("Invalid courseId '{}'", course_id)));
    }
    Ok(())
}

/// Checks the declared type, the sniffed type and the size of an upload.
pub fn validate_image_file(content_type: &str, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::Validation("Image file is empty".to_string()));
    }
    if data.len() > MAX_FILE_SIZE {
        return Err(Error::Validation(format!(
            "Image is too large ({} bytes). Maximum size is {} MB",
            data.len(),
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(Error::Validation(format!(
            "Unsupported file type '{}'. Allowed types: {}",
            content_type,
            ALLOWED_IMAGE_TYPES.join(", ")
        )));
    }
    match detect_image_mime(data) {
        Some(_) => Ok(()),
        None => Err(Error::Validation(
            "File content is not a supported image".to_string(),
        )),
    }
}

/// Only originals under the course's directory may be deleted; thumbnails
/// follow their original.
fn validate_storage_path(course_id: &str, storage_path: &str) -> Result<()> {
    let prefix = format!("courses/{}/", course_id);
    let well_formed = storage_path.starts_with(&prefix)
        && !storage_path.ends_with('/')
        && storage_path.split('/').all(|segment| {
            !segment.is_empty() && segment != "." && segment != ".." && segment != "thumbnails"
        });
    if well_formed {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "storagePath must be a file under {}",
            prefix
        )))
    }
}

fn cover_fields(uploaded: &UploadedImage) -> CourseUpdate {
    CourseUpdate::new()
        .set("image", uploaded.url.clone())
        .set("imageFileName", uploaded.file_name.clone())
        .set("imageStoragePath", uploaded.storage_path.clone())
        .set("thumbnailUrl", uploaded.thumbnail_url.clone())
}

fn banner_fields(uploaded: &UploadedImage) -> CourseUpdate {
    CourseUpdate::new()
        .set("bannerImage", uploaded.url.clone())
        .set("bannerStoragePath", uploaded.storage_path.clone())
}

impl CourseImageService {
    pub fn with_services(deps: ServiceDeps) -> Self {
        Self {
            verifier: deps.verifier,
            courses: deps.courses,
            storage: deps.storage,
            images: deps.images,
        }
    }

    pub fn storage(&self) -> &dyn StorageProvider {
        self.storage.as_ref()
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser> {
        self.verifier.verify_id_token(token).await
    }

    fn ensure_storage_configured(&self) -> Result<()> {
        if self.storage.is_configured() {
            Ok(())
        } else {
            Err(Error::StorageNotConfigured(self.storage.name().to_string()))
        }
    }

    /// Loads the course and checks that `user` may manage it as `instructor_id`.
    async fn authorize(
        &self,
        user: &AuthenticatedUser,
        course_id: &str,
        instructor_id: &str,
    ) -> Result<Course> {
        user.ensure_can_act_for(instructor_id)?;

        let course = self
            .courses
            .get_course(course_id)
            .await?
            .filter(|course| course.is_active)
            .ok_or_else(|| Error::NotFound(format!("Course {}", course_id)))?;

        if course.instructor_id != instructor_id {
            warn!(
                "User {} tried to manage course {} owned by {}",
                user.uid, course_id, course.instructor_id
            );
            return Err(Error::Forbidden(
                "Course does not belong to this instructor".to_string(),
            ));
        }
        Ok(course)
    }

    async fn upload_with_retry(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadResult> {
        let strategy = FixedInterval::from_millis(UPLOAD_RETRY_INTERVAL_MS).take(UPLOAD_RETRIES);
        RetryIf::spawn(
            strategy,
            || async move {
                self.storage
                    .upload_file(path, data, content_type)
                    .await
                    .inspect_err(|e| warn!("Upload of {} failed: {}. Will retry...", path, e))
            },
            |e: &Error| matches!(e, Error::Storage(_)),
        )
        .await
    }

    /// Best-effort removal; failures are logged and swallowed.
    async fn remove_quietly(&self, path: &str) {
        if let Err(e) = self.storage.delete_file(path).await {
            warn!("Failed to remove {}: {}", path, e);
        }
    }

    async fn store_variants(
        &self,
        directory: &str,
        file_name: &str,
        processed: &ProcessedImage,
    ) -> Result<UploadedImage> {
        let storage_path = format!("{}/{}", directory, file_name);
        let thumb_path = thumbnail_path(&storage_path);

        let original = self
            .upload_with_retry(&storage_path, &processed.original, processed.content_type)
            .await?;
        let thumbnail = match self
            .upload_with_retry(&thumb_path, &processed.thumbnail, processed.content_type)
            .await
        {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                self.remove_quietly(&storage_path).await;
                return Err(e);
            }
        };

        Ok(UploadedImage {
            url: original.url,
            file_name: file_name.to_string(),
            storage_path: original.path,
            thumbnail_url: thumbnail.url,
        })
    }

    pub async fn upload(
        &self,
        user: &AuthenticatedUser,
        upload: ImageUpload,
    ) -> Result<UploadedImage> {
        validate_course_id(&upload.course_id)?;
        let course = self
            .authorize(user, &upload.course_id, &upload.instructor_id)
            .await?;
        validate_image_file(&upload.content_type, &upload.data)?;
        self.ensure_storage_configured()?;

        info!(
            "Processing {} image for course {} ({} bytes, {:?})",
            upload.image_type,
            upload.course_id,
            upload.data.len(),
            upload.original_name
        );
        let processed = self
            .images
            .process_image(&upload.data, upload.options)
            .await?;

        let file_name = format!(
            "{}_{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            processed.extension
        );
        let directory = format!("courses/{}/{}", upload.course_id, upload.image_type);
        let uploaded = self
            .store_variants(&directory, &file_name, &processed)
            .await?;
        info!(
            "Stored {} image for course {} at {}",
            upload.image_type, upload.course_id, uploaded.storage_path
        );

        let update = match upload.image_type {
            ImageType::Cover => Some(cover_fields(&uploaded)),
            ImageType::Banner => Some(banner_fields(&uploaded)),
            ImageType::Gallery => None,
        };
        if let Some(update) = update {
            let update = update.touched_at(Utc::now());
            if let Err(e) = self.courses.update_course(&upload.course_id, &update).await {
                self.remove_quietly(&uploaded.storage_path).await;
                self.remove_quietly(&thumbnail_path(&uploaded.storage_path))
                    .await;
                return Err(e);
            }

            if let Some(previous) = course.stored_path(upload.image_type) {
                if previous != uploaded.storage_path {
                    info!("Removing replaced image {}", previous);
                    self.remove_quietly(previous).await;
                    self.remove_quietly(&thumbnail_path(previous)).await;
                }
            }
        }

        Ok(uploaded)
    }

    pub async fn delete(
        &self,
        user: &AuthenticatedUser,
        request: DeleteImageRequest,
    ) -> Result<DeletedImage> {
        validate_course_id(&request.course_id)?;
        if request.instructor_id.is_empty() {
            return Err(Error::Validation("instructorId is required".to_string()));
        }
        if request.storage_path.is_empty() {
            return Err(Error::Validation("storagePath is required".to_string()));
        }
        validate_storage_path(&request.course_id, &request.storage_path)?;

        let course = self
            .authorize(user, &request.course_id, &request.instructor_id)
            .await?;
        self.ensure_storage_configured()?;

        // Clear the document first so it never points at removed files.
        let path = Some(request.storage_path.as_str());
        let update = if course.stored_path(ImageType::Cover) == path {
            Some(
                CourseUpdate::new()
                    .remove("image")
                    .remove("imageFileName")
                    .remove("imageStoragePath")
                    .remove("thumbnailUrl"),
            )
        } else if course.stored_path(ImageType::Banner) == path {
            Some(
                CourseUpdate::new()
                    .remove("bannerImage")
                    .remove("bannerStoragePath"),
            )
        } else {
            None
        };
        if let Some(update) = update {
            self.courses
                .update_course(&request.course_id, &update.touched_at(Utc::now()))
                .await?;
        }

        self.storage.delete_file(&request.storage_path).await?;
        self.remove_quietly(&thumbnail_path(&request.storage_path))
            .await;
        info!(
            "Deleted image {} from course {}",
            request.storage_path, request.course_id
        );

        Ok(DeletedImage {
            deleted: true,
            storage_path: request.storage_path,
        })
    }
}
