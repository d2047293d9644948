//! Service configuration read from the environment.

use crate::google::ServiceAccountKey;
use crate::{Error, Result};
use base64::Engine;
use std::fmt;
use std::path::Path;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SUPABASE_BUCKET: &str = "course-images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProviderKind {
    Firebase,
    Supabase,
}

impl StorageProviderKind {
    /// Parses the `STORAGE_PROVIDER` value. Unknown or empty values fall back
    /// to Firebase.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "supabase" => Self::Supabase,
            Some(v) if v == "firebase" || v.is_empty() => Self::Firebase,
            None => Self::Firebase,
            Some(other) => {
                tracing::warn!(
                    "Unknown STORAGE_PROVIDER '{}', falling back to firebase",
                    other
                );
                Self::Firebase
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firebase => "firebase",
            Self::Supabase => "supabase",
        }
    }
}

impl fmt::Display for StorageProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub service_account: Option<ServiceAccountKey>,
}

impl FirebaseConfig {
    /// Bucket name, defaulting to the project's `appspot.com` bucket.
    pub fn bucket(&self) -> Option<String> {
        self.storage_bucket
            .clone()
            .or_else(|| self.project_id.as_ref().map(|p| format!("{}.appspot.com", p)))
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_provider: StorageProviderKind,
    pub firebase: FirebaseConfig,
    pub supabase: SupabaseConfig,
    pub bind_addr: String,
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let service_account = Self::service_account_from_env()?;
        let project_id = non_empty("FIREBASE_PROJECT_ID")
            .or_else(|| service_account.as_ref().and_then(|k| k.project_id.clone()));

        Ok(Self {
            storage_provider: StorageProviderKind::from_env_value(
                non_empty("STORAGE_PROVIDER").as_deref(),
            ),
            firebase: FirebaseConfig {
                project_id,
                storage_bucket: non_empty("FIREBASE_STORAGE_BUCKET"),
                service_account,
            },
            supabase: SupabaseConfig {
                url: non_empty("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string()),
                service_role_key: non_empty("SUPABASE_SERVICE_ROLE_KEY"),
                bucket: non_empty("SUPABASE_STORAGE_BUCKET")
                    .unwrap_or_else(|| DEFAULT_SUPABASE_BUCKET.to_string()),
            },
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    fn service_account_from_env() -> Result<Option<ServiceAccountKey>> {
        if let Some(path) = non_empty("FIREBASE_SERVICE_ACCOUNT_PATH") {
            return load_service_account_file(Path::new(&path)).map(Some);
        }
        if let Some(encoded) = non_empty("FIREBASE_SERVICE_ACCOUNT_BASE64") {
            return decode_service_account(&encoded).map(Some);
        }
        Ok(None)
    }
}

pub fn load_service_account_file(path: &Path) -> Result<ServiceAccountKey> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| {
        Error::Config(format!(
            "Invalid service account file {}: {}",
            path.display(),
            e
        ))
    })
}

pub fn decode_service_account(encoded: &str) -> Result<ServiceAccountKey> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::Config(format!("FIREBASE_SERVICE_ACCOUNT_BASE64 is not base64: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Config(format!("Invalid service account JSON: {}", e)))
}
