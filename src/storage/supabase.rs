use super::{StorageProvider, UploadResult};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{header, RequestBuilder};
use serde_json::json;

/// Supabase Storage through its REST API, authenticated with the project's
/// service-role key. The bucket is expected to be public.
pub struct SupabaseStorageProvider {
    client: reqwest::Client,
    url: Option<String>,
    service_role_key: Option<String>,
    bucket: String,
}

impl SupabaseStorageProvider {
    pub fn new(
        url: Option<String>,
        service_role_key: Option<String>,
        bucket: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            url: url.map(|u| u.trim_end_matches('/').to_string()),
            service_role_key,
            bucket,
        }
    }

    fn endpoint(&self) -> Result<(&str, &str)> {
        match (&self.url, &self.service_role_key) {
            (Some(url), Some(key)) => Ok((url.as_str(), key.as_str())),
            _ => Err(Error::StorageNotConfigured(self.name().to_string())),
        }
    }

    fn authorize(builder: RequestBuilder, key: &str) -> RequestBuilder {
        builder.bearer_auth(key).header("apikey", key)
    }
}

#[async_trait]
impl StorageProvider for SupabaseStorageProvider {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some() && self.service_role_key.is_some() && !self.bucket.is_empty()
    }

    fn get_public_url(&self, path: &str) -> Result<String> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| Error::StorageNotConfigured(self.name().to_string()))?;
        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            url, self.bucket, path
        ))
    }

    async fn upload_file(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadResult> {
        let (url, key) = self.endpoint()?;
        let endpoint = format!("{}/storage/v1/object/{}/{}", url, self.bucket, path);

        let response = Self::authorize(self.client.post(&endpoint), key)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "true")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Supabase upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!(
                "Supabase upload failed (status {}): {}",
                status, text
            )));
        }

        tracing::debug!(
            "Uploaded {} ({} bytes) to Supabase bucket {}",
            path,
            data.len(),
            self.bucket
        );
        Ok(UploadResult {
            url: self.get_public_url(path)?,
            path: path.to_string(),
        })
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let (url, key) = self.endpoint()?;
        let endpoint = format!("{}/storage/v1/object/{}", url, self.bucket);

        let response = Self::authorize(self.client.delete(&endpoint), key)
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Supabase delete request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Storage(format!(
                "Supabase delete failed (status {}): {}",
                status, text
            )));
        }
        Ok(())
    }
}
