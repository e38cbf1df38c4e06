use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{models::UserId, Error, Result};

/// JWT claims structure
///
/// Tokens come from the meeting API, which shares the signing secret, names
/// the subject `userId` and may not set an expiry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// User ID as the meeting API names it
    #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id_claim: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    /// `sub` when present, otherwise `userId`
    pub fn user_id(&self) -> Option<UserId> {
        self.sub
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.user_id_claim.as_deref().filter(|id| !id.is_empty()))
            .map(|id| UserId::from_string(id.to_string()))
    }
}

/// JWT service for signing and verifying user tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    algorithm: Algorithm,
    access_token_duration: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl JwtService {
    /// Create a new JWT service with an HS256 shared secret
    ///
    /// # Arguments
    /// * `secret` - Shared signing secret
    /// * `access_token_duration_hours` - Lifetime of tokens signed here
    pub fn new(secret: &str, access_token_duration_hours: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Internal("JWT secret must not be empty".to_string()));
        }
        let hours = i64::try_from(access_token_duration_hours)
            .map_err(|_| Error::Internal("JWT token duration out of range".to_string()))?;

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            algorithm: Algorithm::HS256,
            access_token_duration: Duration::hours(hours),
        })
    }

    /// Sign an access token for `user_id`
    pub fn sign_token(&self, user_id: &UserId) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(user_id.as_str().to_string()),
            user_id_claim: None,
            iat: now.timestamp(),
            exp: Some((now + self.access_token_duration).timestamp()),
        };

        let header = Header::new(self.algorithm);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and extract claims
    ///
    /// # Arguments
    /// * `token` - JWT token string
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked when present but not required
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 60; // 60 seconds leeway for clock skew

        let token_data: TokenData<Claims> = decode(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Authentication("Token expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    Error::Authentication("Invalid token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    Error::Authentication("Invalid token signature".to_string())
                }
                _ => Error::Authentication(format!("Token verification failed: {e}")),
            })?;

        if token_data.claims.user_id().is_none() {
            return Err(Error::Authentication("Token has no user id".to_string()));
        }
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret-with-enough-length";

    #[test]
    fn test_sign_and_verify_token() {
        let jwt = JwtService::new(SECRET, 24).unwrap();
        let user_id = UserId::new();

        let token = jwt.sign_token(&user_id).unwrap();
        let claims = jwt.verify_token(&token).unwrap();

        assert_eq!(claims.user_id(), Some(user_id));
        assert!(claims.exp.unwrap() > claims.iat);
    }

    #[test]
    fn test_meeting_api_tokens_are_accepted() {
        let jwt = JwtService::new(SECRET, 24).unwrap();
        let claims = json!({
            "userId": "64f1c0ffee",
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap().as_str(), "64f1c0ffee");
    }

    fn sign(claims: &serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_token_with_both_subject_claims_prefers_sub() {
        let jwt = JwtService::new(SECRET, 24).unwrap();
        let token = sign(&json!({
            "sub": "from-sub",
            "userId": "from-user-id",
            "exp": Utc::now().timestamp() + 3600,
        }));

        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap().as_str(), "from-sub");
    }

    #[test]
    fn test_token_without_expiry_is_accepted() {
        let jwt = JwtService::new(SECRET, 24).unwrap();
        let token = sign(&json!({ "userId": "64f1c0ffee", "iat": Utc::now().timestamp() }));

        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap().as_str(), "64f1c0ffee");
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_token_without_user_is_rejected() {
        let jwt = JwtService::new(SECRET, 24).unwrap();
        let token = sign(&json!({ "exp": Utc::now().timestamp() + 3600 }));

        assert!(matches!(
            jwt.verify_token(&token),
            Err(Error::Authentication(msg)) if msg == "Token has no user id"
        ));
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let jwt = JwtService::new(SECRET, 24).unwrap();
        let other = JwtService::new("a-different-secret-entirely", 24).unwrap();
        let token = other.sign_token(&UserId::new()).unwrap();
        assert!(matches!(jwt.verify_token(&token), Err(Error::Authentication(_))));

        let expired = Claims {
            sub: Some("u1".to_string()),
            user_id_claim: None,
            iat: Utc::now().timestamp() - 7200,
            exp: Some(Utc::now().timestamp() - 3600),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &expired,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            jwt.verify_token(&token),
            Err(Error::Authentication(msg)) if msg == "Token expired"
        ));

        assert!(jwt.verify_token("not-a-jwt").is_err());
        assert!(JwtService::new("", 24).is_err());
    }
}
