use super::{StorageProvider, UploadResult};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockStorageProvider {
    files: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
    base_url: String,
    configured: bool,
    failing_paths: Arc<Mutex<HashSet<String>>>,
    failing_upload_patterns: Arc<Mutex<Vec<String>>>,
    upload_failures_left: Arc<Mutex<usize>>,
    upload_count: Arc<Mutex<usize>>,
    delete_count: Arc<Mutex<usize>>,
}

impl MockStorageProvider {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-storage.example.com".to_string(),
            configured: true,
            failing_paths: Arc::new(Mutex::new(HashSet::new())),
            failing_upload_patterns: Arc::new(Mutex::new(Vec::new())),
            upload_failures_left: Arc::new(Mutex::new(0)),
            upload_count: Arc::new(Mutex::new(0)),
            delete_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn with_file(self, path: &str, content: Vec<u8>) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (content, "image/jpeg".to_string()));
        self
    }

    /// Uploads and deletes touching `path` fail with a storage error.
    pub fn with_failing_path(self, path: &str) -> Self {
        self.failing_paths.lock().unwrap().insert(path.to_string());
        self
    }

    /// Every upload whose path contains `pattern` fails with a storage error.
    pub fn with_failing_uploads_matching(self, pattern: &str) -> Self {
        self.failing_upload_patterns
            .lock()
            .unwrap()
            .push(pattern.to_string());
        self
    }

    /// The next `count` uploads fail, then uploads succeed again.
    pub fn with_transient_upload_failures(self, count: usize) -> Self {
        *self.upload_failures_left.lock().unwrap() = count;
        self
    }

    pub fn get_upload_count(&self) -> usize {
        *self.upload_count.lock().unwrap()
    }

    pub fn get_delete_count(&self) -> usize {
        *self.delete_count.lock().unwrap()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn get_file(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(Error::StorageNotConfigured(self.name().to_string()))
        }
    }
}

impl Default for MockStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageProvider for MockStorageProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn get_public_url(&self, path: &str) -> Result<String> {
        self.ensure_configured()?;
        Ok(format!("{}/{}", self.base_url, path))
    }

    async fn upload_file(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadResult> {
        self.ensure_configured()?;
        *self.upload_count.lock().unwrap() += 1;

        {
            let mut left = self.upload_failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(Error::Storage("Mock transient upload failure".to_string()));
            }
        }
        let pattern_match = self
            .failing_upload_patterns
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| path.contains(pattern.as_str()));
        if pattern_match || self.failing_paths.lock().unwrap().contains(path) {
            return Err(Error::Storage(format!("Mock upload failure for {}", path)));
        }

        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(UploadResult {
            url: self.get_public_url(path)?,
            path: path.to_string(),
        })
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.ensure_configured()?;
        *self.delete_count.lock().unwrap() += 1;

        if self.failing_paths.lock().unwrap().contains(path) {
            return Err(Error::Storage(format!("Mock delete failure for {}", path)));
        }
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}
