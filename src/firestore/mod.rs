//! Course document access over the Firestore REST API
//!
//! Only the `courses` collection is touched: the upload route reads a course
//! to check ownership and writes back the image fields.

pub mod mock;
pub mod values;

pub use mock::MockCourseRepository;

use crate::google::AccessTokenProvider;
use crate::models::{Course, CourseUpdate, COURSES_COLLECTION};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use values::{Document, Value};

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>>;
    async fn update_course(&self, course_id: &str, update: &CourseUpdate) -> Result<()>;
}

pub struct FirestoreCourseRepository {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
    base_url: String,
    project_id: String,
}

impl FirestoreCourseRepository {
    pub fn new(
        project_id: String,
        tokens: Arc<dyn AccessTokenProvider>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            tokens,
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id,
        }
    }

    /// Point at the Firestore emulator or a mock server.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Each id is pushed as its own percent-encoded path segment so it can
    /// never address a different document.
    fn document_url(&self, course_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid Firestore URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Invalid Firestore URL {}", self.base_url)))?
            .pop_if_empty()
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                COURSES_COLLECTION,
                course_id,
            ]);
        Ok(url)
    }
}

#[async_trait]
impl CourseRepository for FirestoreCourseRepository {
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.document_url(course_id)?)
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Firestore(format!(
                "Get course {} failed (status {}): {}",
                course_id, status, text
            )));
        }

        let doc: Document = response.json().await?;
        let id = doc.id().to_string();
        let mut course: Course = serde_json::from_value(values::fields_to_json(doc.fields)?)
            .map_err(|e| Error::Firestore(format!("Malformed course {}: {}", course_id, e)))?;
        course.id = id;
        Ok(Some(course))
    }

    async fn update_course(&self, course_id: &str, update: &CourseUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }

        // Fields named in the mask but absent from the body are deleted.
        let mut fields: HashMap<String, Value> = update
            .set
            .iter()
            .map(|(k, v)| (k.clone(), Value::string(v.clone())))
            .collect();
        if let Some(at) = update.updated_at {
            fields.insert("updatedAt".to_string(), Value::timestamp(at));
        }

        let mut query: Vec<(&str, String)> = update
            .field_paths()
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .patch(self.document_url(course_id)?)
            .bearer_auth(token)
            .query(&query)
            .json(&json!({ "fields": fields }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!("Updated course {} fields {:?}", course_id, update.field_paths());
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("Course {}", course_id))),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::Firestore(format!(
                    "Update course {} failed (status {}): {}",
                    course_id, status, text
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::StaticTokenProvider;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOC_PATH: &str = "/projects/quest/databases/(default)/documents/courses/c1";

    fn repository(server: &MockServer) -> FirestoreCourseRepository {
        FirestoreCourseRepository::new(
            "quest".to_string(),
            Arc::new(StaticTokenProvider::new("owner")),
            reqwest::Client::new(),
        )
        .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_get_course_decodes_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH))
            .and(header("authorization", "Bearer owner"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/quest/databases/(default)/documents/courses/c1",
                "fields": {
                    "title": { "stringValue": "Rust 101" },
                    "instructorId": { "stringValue": "inst-1" },
                    "isActive": { "booleanValue": true },
                    "price": { "integerValue": "0" }
                },
                "createTime": "2024-01-01T00:00:00Z",
                "updateTime": "2024-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let course = repository(&server).get_course("c1").await.unwrap().unwrap();
        assert_eq!(course.id, "c1");
        assert_eq!(course.title, "Rust 101");
        assert_eq!(course.instructor_id, "inst-1");
        assert_eq!(course.image, None);
    }

    #[tokio::test]
    async fn test_course_id_is_encoded_as_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/projects/quest/databases/(default)/documents/courses/victim%23x%3Fa=b",
            ))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DOC_PATH.replace("c1", "victim")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/quest/databases/(default)/documents/courses/victim",
                "fields": { "instructorId": { "stringValue": "inst-9" } }
            })))
            .expect(0)
            .mount(&server)
            .await;

        let course = repository(&server).get_course("victim#x?a=b").await.unwrap();
        assert!(course.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_course_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(repository(&server).get_course("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_course_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend"))
            .mount(&server)
            .await;

        let err = repository(&server).get_course("c1").await.unwrap_err();
        assert!(matches!(err, Error::Firestore(_)));
    }

    #[tokio::test]
    async fn test_update_course_sends_mask_and_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(DOC_PATH))
            .and(query_param("updateMask.fieldPaths", "image"))
            .and(query_param("updateMask.fieldPaths", "thumbnailUrl"))
            .and(query_param("updateMask.fieldPaths", "updatedAt"))
            .and(query_param("currentDocument.exists", "true"))
            .and(body_json(json!({
                "fields": {
                    "image": { "stringValue": "https://x/a.jpg" },
                    "updatedAt": { "timestampValue": "2024-05-06T07:08:09.000Z" }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let update = CourseUpdate::new()
            .set("image", "https://x/a.jpg")
            .remove("thumbnailUrl")
            .touched_at(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap());

        repository(&server).update_course("c1", &update).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_course_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let update = CourseUpdate::new().set("image", "x");
        let err = repository(&server).update_course("c1", &update).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
