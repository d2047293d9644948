//! Pluggable blob storage for course images
//!
//! Uploads go to either Firebase Storage (Google Cloud Storage JSON API) or
//! Supabase Storage. The backend is picked once per process from
//! `STORAGE_PROVIDER` by [`StorageFactory`].

pub mod firebase;
pub mod mock;
pub mod supabase;

pub use firebase::FirebaseStorageProvider;
pub use mock::MockStorageProvider;
pub use supabase::SupabaseStorageProvider;

use crate::config::{Config, StorageProviderKind};
use crate::google::AccessTokenProvider;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub url: String,
    pub path: String,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short backend name, e.g. `firebase`.
    fn name(&self) -> &'static str;

    /// False when required credentials or bucket settings are missing.
    fn is_configured(&self) -> bool;

    fn get_public_url(&self, path: &str) -> Result<String>;

    async fn upload_file(&self, path: &str, data: &[u8], content_type: &str)
        -> Result<UploadResult>;

    async fn delete_file(&self, path: &str) -> Result<()>;
}

static PROVIDER: OnceLock<Arc<dyn StorageProvider>> = OnceLock::new();

pub struct StorageFactory;

impl StorageFactory {
    /// Builds a provider for `config.storage_provider`.
    pub fn create(
        config: &Config,
        http_client: reqwest::Client,
        tokens: Option<Arc<dyn AccessTokenProvider>>,
    ) -> Arc<dyn StorageProvider> {
        let provider: Arc<dyn StorageProvider> = match config.storage_provider {
            StorageProviderKind::Firebase => Arc::new(FirebaseStorageProvider::new(
                config.firebase.bucket(),
                tokens,
                http_client,
            )),
            StorageProviderKind::Supabase => Arc::new(SupabaseStorageProvider::new(
                config.supabase.url.clone(),
                config.supabase.service_role_key.clone(),
                config.supabase.bucket.clone(),
                http_client,
            )),
        };

        if provider.is_configured() {
            tracing::info!("Storage provider: {}", provider.name());
        } else {
            tracing::warn!(
                "Storage provider '{}' is missing configuration; uploads will be rejected",
                provider.name()
            );
        }
        provider
    }

    /// Process-wide provider. The first call decides the backend; later calls
    /// return the same instance regardless of their arguments.
    pub fn global(
        config: &Config,
        http_client: reqwest::Client,
        tokens: Option<Arc<dyn AccessTokenProvider>>,
    ) -> Arc<dyn StorageProvider> {
        PROVIDER
            .get_or_init(|| Self::create(config, http_client, tokens))
            .clone()
    }
}

/// `courses/c1/cover/a.jpg` -> `courses/c1/cover/thumbnails/a.jpg`
pub fn thumbnail_path(storage_path: &str) -> String {
    match storage_path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/thumbnails/{}", dir, file),
        None => format!("thumbnails/{}", storage_path),
    }
}
