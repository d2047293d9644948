//! Google service-account credentials shared by the Firebase Storage and
//! Firestore clients.

pub mod credentials;

pub use credentials::{
    AccessTokenProvider, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenProvider,
};

/// OAuth scopes requested for server-to-server Firebase access.
pub const FIREBASE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/datastore",
    "https://www.googleapis.com/auth/devstorage.read_write",
];
