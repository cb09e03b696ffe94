use anyhow::Result;
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::common::{AuthError, GlobalRole, UserId};
use crate::kernel::{BaseIdentityProvider, VerifiedIdentity};

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,      // Subject (user_id as string)
    pub user_id: UserId,
    pub role: GlobalRole, // Platform role at issue time
    pub exp: i64,         // Expiration timestamp
    pub iat: i64,         // Issued at timestamp
    pub iss: String,      // Issuer
    pub jti: String,      // JWT ID (unique token identifier)
}

/// Identity provider backed by HS256 JWTs.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Create a token for a user. Tokens expire after 24 hours.
    pub fn create_token(&self, user_id: UserId, role: GlobalRole) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(24);

        let claims = Claims {
            sub: user_id.to_string(),
            user_id,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify signature, expiry and issuer.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

#[async_trait]
impl BaseIdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> std::result::Result<VerifiedIdentity, AuthError> {
        let claims = self.verify_token(token).map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })?;
        Ok(VerifiedIdentity {
            user_id: claims.user_id,
            global_role: claims.role,
        })
    }
}
