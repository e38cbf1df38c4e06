//! Conferencing service API tokens
//!
//! Server calls and webhook deliveries are both authenticated with HS256 JWTs
//! signed by the shared API key/secret pair.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::{Error, Result};

const ACCESS_TOKEN_TTL_SECONDS: i64 = 600;

/// Video grant carried by server API tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub room_record: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub iss: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

/// Claims of a webhook `Authorization` token
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookClaims {
    pub iss: String,
    /// base64 SHA-256 of the request body
    pub sha256: String,
}

/// Signs short-lived tokens for egress API calls
#[derive(Clone)]
pub struct EgressTokenSigner {
    api_key: String,
    encoding_key: Arc<EncodingKey>,
}

impl std::fmt::Debug for EgressTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EgressTokenSigner")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl EgressTokenSigner {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            encoding_key: Arc::new(EncodingKey::from_secret(api_secret.as_bytes())),
        }
    }

    /// Token granting `roomRecord`
    pub fn record_token(&self) -> Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            iss: self.api_key.clone(),
            nbf: now.timestamp(),
            exp: (now + Duration::seconds(ACCESS_TOKEN_TTL_SECONDS)).timestamp(),
            video: VideoGrant { room_record: true },
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign egress token: {e}")))
    }
}

/// Verifies signed webhook deliveries
#[derive(Clone)]
pub struct WebhookVerifier {
    api_key: String,
    decoding_key: Arc<DecodingKey>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            decoding_key: Arc::new(DecodingKey::from_secret(api_secret.as_bytes())),
        }
    }

    /// Check the `Authorization` header value against the raw body.
    ///
    /// Accepts the bare token or a `Bearer ` prefixed one.
    pub fn verify(&self, authorization: &str, body: &[u8]) -> Result<()> {
        let token = authorization
            .strip_prefix("Bearer ")
            .unwrap_or(authorization)
            .trim();
        if token.is_empty() {
            return Err(Error::Authentication("Missing webhook signature".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.api_key]);
        validation.leeway = 60;

        let claims = decode::<WebhookClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Authentication(format!("Invalid webhook signature: {e}")))?
            .claims;

        let digest = STANDARD.encode(Sha256::digest(body));
        if claims.sha256 != digest {
            return Err(Error::Authentication("Webhook body checksum mismatch".to_string()));
        }

        Ok(())
    }
}
