use super::{AuthenticatedUser, TokenVerifier};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockTokenVerifier {
    users: Arc<Mutex<HashMap<String, AuthenticatedUser>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as the given user.
    pub fn with_user(self, token: &str, uid: &str, role: Option<&str>) -> Self {
        self.users.lock().unwrap().insert(
            token.to_string(),
            AuthenticatedUser {
                uid: uid.to_string(),
                email: Some(format!("{}@example.com", uid)),
                role: role.map(str::to_string),
            },
        );
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl TokenVerifier for MockTokenVerifier {
    async fn verify_id_token(&self, token: &str) -> Result<AuthenticatedUser> {
        *self.call_count.lock().unwrap() += 1;
        self.users
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Invalid ID token".to_string()))
    }
}
