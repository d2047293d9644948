//! Data models and structures
//!
//! Course documents as stored in Firestore, plus the request and response
//! shapes of the course image API.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const COURSES_COLLECTION: &str = "courses";

fn default_true() -> bool {
    true
}

/// The fields of a `courses` document this service reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub instructor_id: String,
    pub image: Option<String>,
    pub image_file_name: Option<String>,
    pub image_storage_path: Option<String>,
    pub thumbnail_url: Option<String>,
    pub banner_image: Option<String>,
    pub banner_storage_path: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Course {
    /// Storage path currently recorded for `image_type`, if any.
    pub fn stored_path(&self, image_type: ImageType) -> Option<&str> {
        match image_type {
            ImageType::Cover => self.image_storage_path.as_deref(),
            ImageType::Banner => self.banner_storage_path.as_deref(),
            ImageType::Gallery => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Cover,
    Banner,
    Gallery,
}

impl ImageType {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "cover" => Ok(Self::Cover),
            "banner" => Ok(Self::Banner),
            "gallery" => Ok(Self::Gallery),
            other => Err(Error::Validation(format!(
                "Invalid imageType '{}'. Expected cover, banner or gallery",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Banner => "banner",
            Self::Gallery => "gallery",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partial update of a course document: fields to set, fields to remove,
/// and the `updatedAt` timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseUpdate {
    pub set: BTreeMap<String, String>,
    pub remove: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CourseUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<String>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    pub fn remove(mut self, field: &str) -> Self {
        self.remove.push(field.to_string());
        self
    }

    pub fn touched_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty() && self.updated_at.is_none()
    }

    /// Document fields named by this update, for a Firestore update mask.
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.set.keys().cloned().collect();
        paths.extend(self.remove.iter().cloned());
        if self.updated_at.is_some() {
            paths.push("updatedAt".to_string());
        }
        paths
    }
}

/// Validated upload request, built from the multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub course_id: String,
    pub instructor_id: String,
    pub image_type: ImageType,
    pub content_type: String,
    pub original_name: Option<String>,
    pub data: Vec<u8>,
    pub options: crate::image::ResizeOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageRequest {
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub instructor_id: String,
    #[serde(default)]
    pub storage_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub url: String,
    pub file_name: String,
    pub storage_path: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeletedImage {
    pub deleted: bool,
    pub storage_path: String,
}

/// Success envelope: `{ "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_deserializes_from_camel_case() {
        let course: Course = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "title": "Rust 101",
            "instructorId": "inst-1",
            "imageStoragePath": "courses/c1/cover/a.jpg",
            "price": 0
        }))
        .unwrap();

        assert_eq!(course.instructor_id, "inst-1");
        assert_eq!(course.stored_path(ImageType::Cover), Some("courses/c1/cover/a.jpg"));
        assert_eq!(course.stored_path(ImageType::Banner), None);
        assert!(course.is_active);
    }

    #[test]
    fn test_image_type_parsing() {
        assert_eq!(ImageType::parse("").unwrap(), ImageType::Cover);
        assert_eq!(ImageType::parse("Banner").unwrap(), ImageType::Banner);
        assert_eq!(ImageType::parse("gallery").unwrap(), ImageType::Gallery);
        assert!(matches!(ImageType::parse("avatar"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_course_update_field_paths() {
        let update = CourseUpdate::new()
            .set("image", "https://x/a.jpg")
            .remove("thumbnailUrl")
            .touched_at(Utc::now());

        assert_eq!(
            update.field_paths(),
            vec!["image".to_string(), "thumbnailUrl".to_string(), "updatedAt".to_string()]
        );
        assert!(CourseUpdate::new().is_empty());
    }

    #[test]
    fn test_uploaded_image_serializes_camel_case() {
        let body = DataResponse {
            data: UploadedImage {
                url: "u".to_string(),
                file_name: "f.jpg".to_string(),
                storage_path: "courses/c1/cover/f.jpg".to_string(),
                thumbnail_url: "t".to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["data"]["fileName"], "f.jpg");
        assert_eq!(json["data"]["storagePath"], "courses/c1/cover/f.jpg");
        assert_eq!(json["data"]["thumbnailUrl"], "t");
    }
}
