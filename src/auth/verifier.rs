use super::{AuthenticatedUser, TokenVerifier};
use crate::{Error, Result};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const SECURETOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_KEY_MAX_AGE: u64 = 3600;
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
    expires_at: Instant,
}

impl CachedKeys {
    /// Unknown key ids trigger at most one refetch per interval.
    fn may_refresh(&self) -> bool {
        self.fetched_at.elapsed() >= MIN_REFRESH_INTERVAL
    }
}

/// Verifies Firebase Auth ID tokens against Google's published signing keys.
pub struct FirebaseTokenVerifier {
    project_id: String,
    keys_url: String,
    client: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseTokenVerifier {
    pub fn new(project_id: String, client: reqwest::Client) -> Self {
        Self {
            project_id,
            keys_url: SECURETOKEN_JWKS_URL.to_string(),
            client,
            cache: RwLock::new(None),
        }
    }

    pub fn with_keys_url(mut self, keys_url: String) -> Self {
        self.keys_url = keys_url;
        self
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = &*cache {
                if let Some(key) = cached.keys.get(kid) {
                    if Instant::now() < cached.expires_at {
                        return Ok(key.clone());
                    }
                } else if !cached.may_refresh() {
                    return Err(unknown_kid(kid));
                }
            }
        }

        // Stale cache or an unknown kid after the refresh interval: Google
        // may have rotated keys.
        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| unknown_kid(kid))
    }

    async fn refresh_keys(&self) -> Result<()> {
        let mut cache = self.cache.write().await;
        // A concurrent request may already have refreshed.
        if let Some(cached) = &*cache {
            if Instant::now() < cached.expires_at && !cached.may_refresh() {
                return Ok(());
            }
        }

        let response = self
            .client
            .get(&self.keys_url)
            .send()
            .await
            .map_err(|e| Error::Unavailable(format!("Token signing keys request failed: {}", e)))?;

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_MAX_AGE);

        if !response.status().is_success() {
            return Err(Error::Unavailable(format!(
                "Could not fetch token signing keys (status {})",
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| Error::Unavailable(format!("Malformed token signing keys: {}", e)))?;
        let mut keys = HashMap::with_capacity(set.keys.len());
        for jwk in set.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => tracing::warn!("Skipping malformed signing key {}: {}", jwk.kid, e),
            }
        }

        tracing::debug!("Loaded {} token signing keys (max-age {}s)", keys.len(), max_age);
        let now = Instant::now();
        *cache = Some(CachedKeys {
            keys,
            fetched_at: now,
            expires_at: now + Duration::from_secs(max_age),
        });
        Ok(())
    }
}

fn unknown_kid(kid: &str) -> Error {
    Error::Unauthorized(format!("Unknown signing key '{}'", kid))
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("max-age="))
        .and_then(|v| v.parse().ok())
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify_id_token(&self, token: &str) -> Result<AuthenticatedUser> {
        let header = decode_header(token)
            .map_err(|e| Error::Unauthorized(format!("Malformed ID token: {}", e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(Error::Unauthorized(
                "ID token must be signed with RS256".to_string(),
            ));
        }
        let kid = header
            .kid
            .ok_or_else(|| Error::Unauthorized("ID token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);

        let claims = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| Error::Unauthorized(format!("Invalid ID token: {}", e)))?
            .claims;

        if claims.sub.is_empty() {
            return Err(Error::Unauthorized("ID token has an empty subject".to_string()));
        }

        Ok(AuthenticatedUser {
            uid: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY_PEM: &str = include_str!("../../tests/fixtures/test_rsa_key.pem");
    const TEST_KEY_N: &str = include_str!("../../tests/fixtures/test_rsa_key.n");
    const PROJECT: &str = "quest-test";

    fn sign(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims_for(uid: &str, project: &str) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": uid,
            "aud": project,
            "iss": format!("https://securetoken.google.com/{}", project),
            "iat": now,
            "exp": now + 600,
            "auth_time": now,
            "email": "inst@example.com",
            "role": "instructor"
        })
    }

    async fn verifier_with_keys() -> (MockServer, FirebaseTokenVerifier) {
        let server = MockServer::start().await;
        mount_keys(&server, None).await;

        let verifier = FirebaseTokenVerifier::new(PROJECT.to_string(), reqwest::Client::new())
            .with_keys_url(format!("{}/jwks", server.uri()));
        (server, verifier)
    }

    async fn mount_keys(server: &MockServer, expected_fetches: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("cache-control", "public, max-age=19000, must-revalidate")
                    .set_body_json(json!({
                        "keys": [{
                            "kid": "test-kid",
                            "kty": "RSA",
                            "alg": "RS256",
                            "use": "sig",
                            "n": TEST_KEY_N.trim(),
                            "e": "AQAB"
                        }]
                    })),
            );
        match expected_fetches {
            Some(n) => mock.expect(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    #[test]
    fn test_parse_max_age() {
        assert_eq!(
            parse_max_age("public, max-age=22518, must-revalidate, no-transform"),
            Some(22518)
        );
        assert_eq!(parse_max_age("no-cache"), None);
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        let (_server, verifier) = verifier_with_keys().await;
        let token = sign(claims_for("inst-1", PROJECT), "test-kid");

        let user = verifier.verify_id_token(&token).await.unwrap();
        assert_eq!(user.uid, "inst-1");
        assert_eq!(user.email.as_deref(), Some("inst@example.com"));
        assert_eq!(user.role.as_deref(), Some("instructor"));
    }

    #[tokio::test]
    async fn test_wrong_audience_is_rejected() {
        let (_server, verifier) = verifier_with_keys().await;
        let token = sign(claims_for("inst-1", "other-project"), "test-kid");

        let err = verifier.verify_id_token(&token).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_rejected() {
        let (_server, verifier) = verifier_with_keys().await;
        let token = sign(claims_for("inst-1", PROJECT), "rotated-away");

        let err = verifier.verify_id_token(&token).await.unwrap_err();
        assert!(err.to_string().contains("rotated-away"));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let (_server, verifier) = verifier_with_keys().await;
        let mut claims = claims_for("inst-1", PROJECT);
        let past = Utc::now().timestamp() - 7200;
        claims["iat"] = json!(past);
        claims["exp"] = json!(past + 600);
        let token = sign(claims, "test-kid");

        assert!(verifier.verify_id_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let (_server, verifier) = verifier_with_keys().await;
        let err = verifier.verify_id_token("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unknown_kids_do_not_refetch_fresh_keys() {
        let server = MockServer::start().await;
        mount_keys(&server, Some(1)).await;
        let verifier = FirebaseTokenVerifier::new(PROJECT.to_string(), reqwest::Client::new())
            .with_keys_url(format!("{}/jwks", server.uri()));

        for _ in 0..20 {
            let token = sign(claims_for("inst-1", PROJECT), "bogus");
            let err = verifier.verify_id_token(&token).await.unwrap_err();
            assert!(matches!(err, Error::Unauthorized(_)));
        }

        let token = sign(claims_for("inst-1", PROJECT), "test-kid");
        assert!(verifier.verify_id_token(&token).await.is_ok());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_key_fetch_failure_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let verifier = FirebaseTokenVerifier::new(PROJECT.to_string(), reqwest::Client::new())
            .with_keys_url(format!("{}/jwks", server.uri()));

        let token = sign(claims_for("inst-1", PROJECT), "test-kid");
        let err = verifier.verify_id_token(&token).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
