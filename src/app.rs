//! Wires the production services together from [`Config`].

use crate::auth::FirebaseTokenVerifier;
use crate::config::Config;
use crate::firestore::FirestoreCourseRepository;
use crate::google::{AccessTokenProvider, ServiceAccountTokenSource, FIREBASE_SCOPES};
use crate::image::ImageProcessor;
use crate::service::{CourseImageService, ServiceDeps};
use crate::storage::StorageFactory;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the service backed by Firebase Auth, Firestore and the storage
/// provider selected by `STORAGE_PROVIDER`.
pub fn build_service(config: &Config) -> Result<CourseImageService> {
    let project_id = config
        .firebase
        .project_id
        .clone()
        .ok_or_else(|| Error::Config("FIREBASE_PROJECT_ID not set".to_string()))?;
    let key = config.firebase.service_account.clone().ok_or_else(|| {
        Error::Config(
            "FIREBASE_SERVICE_ACCOUNT_PATH or FIREBASE_SERVICE_ACCOUNT_BASE64 must be set"
                .to_string(),
        )
    })?;

    // One connection pool for every Google and Supabase call.
    let http_client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let tokens: Arc<dyn AccessTokenProvider> = Arc::new(ServiceAccountTokenSource::new(
        key,
        FIREBASE_SCOPES,
        http_client.clone(),
    ));

    let storage = StorageFactory::global(config, http_client.clone(), Some(tokens.clone()));
    let courses = FirestoreCourseRepository::new(project_id.clone(), tokens, http_client.clone());
    let verifier = FirebaseTokenVerifier::new(project_id.clone(), http_client);

    info!(
        "Firebase project {} (storage: {})",
        project_id,
        storage.name()
    );

    Ok(CourseImageService::with_services(ServiceDeps {
        verifier: Arc::new(verifier),
        courses: Arc::new(courses),
        storage,
        images: Arc::new(ImageProcessor::new()),
    }))
}
