use super::{StorageProvider, UploadResult};
use crate::google::AccessTokenProvider;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use std::sync::Arc;

const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Firebase Storage through the Google Cloud Storage JSON API.
///
/// Objects are uploaded with the `publicRead` ACL so the returned URL can be
/// embedded directly in course pages.
pub struct FirebaseStorageProvider {
    client: reqwest::Client,
    bucket: Option<String>,
    tokens: Option<Arc<dyn AccessTokenProvider>>,
    base_url: String,
}

impl FirebaseStorageProvider {
    pub fn new(
        bucket: Option<String>,
        tokens: Option<Arc<dyn AccessTokenProvider>>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            bucket,
            tokens,
            base_url: GCS_BASE_URL.to_string(),
        }
    }

    /// Point at an emulator or mock server instead of Google.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn credentials(&self) -> Result<(&str, &Arc<dyn AccessTokenProvider>)> {
        match (&self.bucket, &self.tokens) {
            (Some(bucket), Some(tokens)) => Ok((bucket.as_str(), tokens)),
            _ => Err(Error::StorageNotConfigured(self.name().to_string())),
        }
    }

    fn encode_object_name(path: &str) -> String {
        url::form_urlencoded::byte_serialize(path.as_bytes()).collect()
    }
}

#[async_trait]
impl StorageProvider for FirebaseStorageProvider {
    fn name(&self) -> &'static str {
        "firebase"
    }

    fn is_configured(&self) -> bool {
        self.bucket.is_some() && self.tokens.is_some()
    }

    fn get_public_url(&self, path: &str) -> Result<String> {
        let bucket = self
            .bucket
            .as_deref()
            .ok_or_else(|| Error::StorageNotConfigured(self.name().to_string()))?;
        Ok(format!("{}/{}/{}", self.base_url, bucket, path))
    }

    async fn upload_file(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadResult> {
        let (bucket, tokens) = self.credentials()?;
        let token = tokens.access_token().await?;
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, bucket);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .header(header::CONTENT_TYPE, content_type)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Firebase upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!(
                "Firebase upload failed (status {}): {}",
                status, text
            )));
        }

        tracing::debug!("Uploaded {} ({} bytes) to gs://{}", path, data.len(), bucket);
        Ok(UploadResult {
            url: self.get_public_url(path)?,
            path: path.to_string(),
        })
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let (bucket, tokens) = self.credentials()?;
        let token = tokens.access_token().await?;
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            bucket,
            Self::encode_object_name(path)
        );

        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Firebase delete request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::warn!("Object {} was already absent from gs://{}", path, bucket);
                Ok(())
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::Storage(format!(
                    "Firebase delete failed (status {}): {}",
                    status, text
                )))
            }
        }
    }
}
